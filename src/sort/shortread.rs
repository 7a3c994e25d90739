//! Sorting by packed keys of a fixed number of symbols
//!
//! Each suffix gets a key of up to [`SHORTREAD_KEY_UNITS`] symbols read as three
//! packed windows. For reads no longer than the key, the keys alone decide every
//! comparison, so a bucket is sorted without touching the sequence again. Longer
//! suffixes fall back to a full comparison once their keys agree.

use std::cmp::Ordering;

use crate::encseq::{
    compare_window_step, EncodedSequence, ReadMode, TwobitWindow, WindowCmp, UNITS_IN_TWOBIT,
};
use crate::error::Result;

use super::{finish_tied, report_ties, require_twobit, SortContext, UnsortedRangeHandler};

const WINDOWS_PER_KEY: usize = 3;

/// Number of symbols held by one key
pub const SHORTREAD_KEY_UNITS: usize = WINDOWS_PER_KEY * UNITS_IN_TWOBIT;

/// Partitions up to this width are finished by insertion sort
const INSERTION_SORT_MAX: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
struct ShortKey {
    start: usize,
    windows: [TwobitWindow; WINDOWS_PER_KEY],
}

/// Reusable packed-key sorter for 4-symbol alphabets
#[derive(Debug, Default)]
pub struct ShortReadSort {
    keys: Vec<ShortKey>,
    stack: Vec<(usize, usize)>,
}
impl ShortReadSort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts `suffixes`, which agree on their first `depth` symbols
    ///
    /// # Errors
    ///
    /// Fails if the alphabet of `encseq` does not have four symbols.
    #[allow(clippy::too_many_arguments)]
    pub fn sort<H: UnsortedRangeHandler>(
        &mut self,
        encseq: &EncodedSequence,
        mode: ReadMode,
        suffixes: &mut [usize],
        lcps: &mut [usize],
        offset: usize,
        depth: usize,
        maxdepth: usize,
        handler: &mut H,
    ) -> Result<()> {
        require_twobit(encseq, "shortread")?;
        if suffixes.len() < 2 {
            return Ok(());
        }
        if depth >= maxdepth {
            finish_tied(suffixes, lcps, maxdepth);
            return report_ties(lcps, offset, maxdepth, handler);
        }
        let ctx = SortContext {
            encseq,
            mode,
            maxdepth,
        };
        self.keys.clear();
        self.keys
            .extend(suffixes.iter().map(|&start| Self::extract(&ctx, start, depth)));
        self.quicksort(&ctx, depth);

        for (slot, key) in suffixes.iter_mut().zip(&self.keys) {
            *slot = key.start;
        }
        for i in 1..self.keys.len() {
            lcps[i] = Self::compare(&ctx, &self.keys[i - 1], &self.keys[i], depth).1;
        }
        report_ties(lcps, offset, maxdepth, handler)
    }

    fn extract(ctx: &SortContext<'_>, start: usize, depth: usize) -> ShortKey {
        let mut key = ShortKey {
            start,
            ..ShortKey::default()
        };
        for w in 0..WINDOWS_PER_KEY {
            let window = ctx
                .encseq
                .extract_twobit(start + depth + w * UNITS_IN_TWOBIT, ctx.mode);
            key.windows[w] = window;
            if (window.units as usize) < UNITS_IN_TWOBIT {
                break;
            }
        }
        key
    }

    /// Order and common prefix length of two keyed suffixes
    fn compare(ctx: &SortContext<'_>, a: &ShortKey, b: &ShortKey, depth: usize) -> (Ordering, usize) {
        let bound = ctx.maxdepth - depth;
        for w in 0..WINDOWS_PER_KEY {
            let done = w * UNITS_IN_TWOBIT;
            if done >= bound {
                return (a.start.cmp(&b.start), ctx.maxdepth);
            }
            let limit = (bound - done).min(UNITS_IN_TWOBIT);
            match compare_window_step(&a.windows[w], &b.windows[w], limit) {
                WindowCmp::Decided(Ordering::Equal, common) => {
                    return (a.start.cmp(&b.start), depth + done + common)
                }
                WindowCmp::Decided(order, common) => return (order, depth + done + common),
                WindowCmp::Continue => {}
            }
        }
        ctx.compare(a.start, b.start, depth + SHORTREAD_KEY_UNITS)
    }

    /// Explicit-stack quicksort of the keys
    fn quicksort(&mut self, ctx: &SortContext<'_>, depth: usize) {
        let less = |a: &ShortKey, b: &ShortKey| Self::compare(ctx, a, b, depth).0 == Ordering::Less;
        self.stack.clear();
        self.stack.push((0, self.keys.len()));
        while let Some((lo, hi)) = self.stack.pop() {
            let part = &mut self.keys[lo..hi];
            if part.len() <= INSERTION_SORT_MAX {
                for i in 1..part.len() {
                    let mut j = i;
                    while j > 0 && less(&part[j], &part[j - 1]) {
                        part.swap(j, j - 1);
                        j -= 1;
                    }
                }
                continue;
            }
            // median of three moved to the end
            let last = part.len() - 1;
            let mid = part.len() / 2;
            if less(&part[mid], &part[0]) {
                part.swap(mid, 0);
            }
            if less(&part[last], &part[0]) {
                part.swap(last, 0);
            }
            if less(&part[mid], &part[last]) {
                part.swap(mid, last);
            }
            let pivot = part[last];
            let mut store = 0;
            for i in 0..last {
                if less(&part[i], &pivot) {
                    part.swap(i, store);
                    store += 1;
                }
            }
            part.swap(store, last);
            // smaller side last so it is taken first
            let left = (lo, lo + store);
            let right = (lo + store + 1, hi);
            if store < last - store {
                self.stack.push(right);
                self.stack.push(left);
            } else {
                self.stack.push(left);
                self.stack.push(right);
            }
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::sort::testing::{naive_sort, random_dna, regular_positions};
    use crate::sort::{IgnoreUnsorted, UnsortedRanges};
    use crate::{Alphabet, EncseqBuilder};
    use anyhow::Result;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn reads(seed: u64, count: usize, len: usize) -> Result<EncodedSequence> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut builder = EncseqBuilder::new(Alphabet::dna());
        let template: Vec<u8> = (0..len).map(|_| b"ACGT"[rng.random_range(0..4)]).collect();
        for _ in 0..count {
            // near-copies of one template share long prefixes
            let mut read = template.clone();
            for _ in 0..rng.random_range(0..3) {
                let idx = rng.random_range(0..len);
                read[idx] = b"ACGTN"[rng.random_range(0..5)];
            }
            builder.add_sequence(b"", &read)?;
        }
        Ok(builder.build()?)
    }

    #[test]
    fn test_short_reads() -> Result<()> {
        let encseq = reads(3, 60, 80)?;
        assert_eq!(encseq.equal_length(), Some(80));
        for mode in [ReadMode::Forward, ReadMode::ReverseComplement] {
            let positions = regular_positions(&encseq, mode);
            for maxdepth in [10, usize::MAX] {
                let (expected, expected_lcps) = naive_sort(&encseq, mode, &positions, maxdepth);
                let mut suffixes = positions.clone();
                let mut lcps = vec![0; suffixes.len()];
                let mut ranges = UnsortedRanges::default();
                ShortReadSort::new().sort(
                    &encseq,
                    mode,
                    &mut suffixes,
                    &mut lcps,
                    0,
                    0,
                    maxdepth,
                    &mut ranges,
                )?;
                assert_eq!(suffixes, expected, "{mode} {maxdepth}");
                assert_eq!(lcps[1..], expected_lcps[1..], "{mode} {maxdepth}");
                assert_eq!(ranges.ranges.is_empty(), maxdepth == usize::MAX);
            }
        }
        Ok(())
    }

    #[test]
    fn test_long_suffixes_fall_back() -> Result<()> {
        let encseq = random_dna(8, 1200)?;
        let positions = regular_positions(&encseq, ReadMode::Forward);
        let (expected, expected_lcps) =
            naive_sort(&encseq, ReadMode::Forward, &positions, usize::MAX);
        let mut suffixes = positions.clone();
        let mut lcps = vec![0; suffixes.len()];
        ShortReadSort::new().sort(
            &encseq,
            ReadMode::Forward,
            &mut suffixes,
            &mut lcps,
            0,
            0,
            usize::MAX,
            &mut IgnoreUnsorted,
        )?;
        assert_eq!(suffixes, expected);
        assert_eq!(lcps[1..], expected_lcps[1..]);
        Ok(())
    }
}
