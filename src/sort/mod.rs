//! # Bucket sorters
//!
//! Every sorter takes a slice of suffix start positions that agree on their first
//! `depth` symbols and reorders it in place, writing the length of the common prefix of
//! each suffix with its predecessor into a parallel LCP slice (the first entry is left
//! untouched, it belongs to the caller). Comparisons look at no more than `maxdepth`
//! symbols. Suffixes still tied at the bound are kept in ascending position order and
//! reported to an [`UnsortedRangeHandler`].
//!
//! | Sorter | Alphabet | Suited for |
//! |--------|----------|------------|
//! | [`BlindTrie`] | any | small buckets, buckets with many special symbols |
//! | [`RadixSortString`] | 4 symbols | wide buckets of long sequences |
//! | [`ShortReadSort`] | 4 symbols | buckets of short reads |

use std::cmp::Ordering;
use std::fmt;

use auto_impl::auto_impl;

use crate::encseq::{EncodedSequence, ReadMode};
use crate::error::{Result, SortError};

pub mod blindtrie;
pub mod radix;
pub mod shortread;

pub use blindtrie::{BlindTrie, InputOrder};
pub use radix::RadixSortString;
pub use shortread::{ShortReadSort, SHORTREAD_KEY_UNITS};

/// Default bucket width up to which [`BucketSort::Auto`] uses the blind trie
pub const DEFAULT_TRIE_THRESHOLD: usize = 64;

/// Receives runs of suffixes whose order could not be decided within the depth bound
///
/// `left` is the suffix table offset of the first suffix of the run, `width` its number
/// of suffixes and `depth` the number of symbols they are known to share.
#[auto_impl(&mut, Box)]
pub trait UnsortedRangeHandler {
    fn process_unsorted_range(&mut self, left: usize, width: usize, depth: usize) -> Result<()>;
}

/// Handler that drops all unsorted ranges
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreUnsorted;
impl UnsortedRangeHandler for IgnoreUnsorted {
    fn process_unsorted_range(&mut self, _left: usize, _width: usize, _depth: usize) -> Result<()> {
        Ok(())
    }
}

/// A run of suffixes tied at the depth bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsortedRange {
    pub left: usize,
    pub width: usize,
    pub depth: usize,
}

/// Handler that collects all unsorted ranges
#[derive(Debug, Clone, Default)]
pub struct UnsortedRanges {
    pub ranges: Vec<UnsortedRange>,
}
impl UnsortedRanges {
    /// Hands the collected ranges to `handler` in the order they were reported
    pub fn replay<H: UnsortedRangeHandler>(&self, handler: &mut H) -> Result<()> {
        for range in &self.ranges {
            handler.process_unsorted_range(range.left, range.width, range.depth)?;
        }
        Ok(())
    }
}
impl UnsortedRangeHandler for UnsortedRanges {
    fn process_unsorted_range(&mut self, left: usize, width: usize, depth: usize) -> Result<()> {
        self.ranges.push(UnsortedRange { left, width, depth });
        Ok(())
    }
}

/// Which sorter handles the regular suffixes of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketSort {
    /// Pick per bucket from the alphabet, the bucket width and the read length
    #[default]
    Auto,
    Radix,
    BlindTrie,
    ShortRead,
}
impl BucketSort {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Radix => "radix",
            Self::BlindTrie => "blindtrie",
            Self::ShortRead => "shortread",
        }
    }
}
impl fmt::Display for BucketSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared arguments of one sort call
#[derive(Debug, Clone, Copy)]
pub(crate) struct SortContext<'a> {
    pub encseq: &'a EncodedSequence,
    pub mode: ReadMode,
    pub maxdepth: usize,
}
impl SortContext<'_> {
    /// Order of two suffixes agreeing on `depth` symbols; ties at the bound go by position
    #[inline]
    pub fn compare(&self, a: usize, b: usize, depth: usize) -> (Ordering, usize) {
        let (order, lcp) = self
            .encseq
            .compare_suffixes(a, b, self.mode, depth, self.maxdepth);
        (order.then(a.cmp(&b)), lcp)
    }
}

/// Finishes a range whose suffixes all agree up to the bound
pub(crate) fn finish_tied(suffixes: &mut [usize], lcps: &mut [usize], maxdepth: usize) {
    suffixes.sort_unstable();
    for lcp in lcps.iter_mut().skip(1) {
        *lcp = maxdepth;
    }
}

/// Sorts by insertion using the full comparator, then fills in the LCP values
pub(crate) fn insertion_sort(
    ctx: &SortContext<'_>,
    suffixes: &mut [usize],
    lcps: &mut [usize],
    depth: usize,
) {
    for i in 1..suffixes.len() {
        let current = suffixes[i];
        let mut j = i;
        while j > 0 && ctx.compare(suffixes[j - 1], current, depth).0 == Ordering::Greater {
            suffixes[j] = suffixes[j - 1];
            j -= 1;
        }
        suffixes[j] = current;
    }
    for i in 1..suffixes.len() {
        lcps[i] = ctx.compare(suffixes[i - 1], suffixes[i], depth).1;
    }
}

/// Reports every maximal run of suffixes tied at `maxdepth`
pub(crate) fn report_ties<H: UnsortedRangeHandler>(
    lcps: &[usize],
    offset: usize,
    maxdepth: usize,
    handler: &mut H,
) -> Result<()> {
    let mut i = 1;
    while i < lcps.len() {
        if lcps[i] < maxdepth {
            i += 1;
            continue;
        }
        let start = i - 1;
        while i < lcps.len() && lcps[i] >= maxdepth {
            i += 1;
        }
        handler.process_unsorted_range(offset + start, i - start, maxdepth)?;
    }
    Ok(())
}

/// One instance of each sorter with its scratch space, dispatching per bucket
#[derive(Debug, Default)]
pub struct BucketSorter {
    kind: BucketSort,
    trie_threshold: usize,
    blindtrie: BlindTrie,
    radix: RadixSortString,
    shortread: ShortReadSort,
}
impl BucketSorter {
    #[must_use]
    pub fn new(kind: BucketSort, trie_threshold: usize) -> Self {
        Self {
            kind,
            trie_threshold,
            ..Self::default()
        }
    }

    /// The sorter used for a bucket of `width` suffixes
    #[must_use]
    pub fn choose(&self, encseq: &EncodedSequence, width: usize) -> BucketSort {
        match self.kind {
            BucketSort::Auto => {
                if !encseq.alphabet().is_twobit() || width <= self.trie_threshold {
                    BucketSort::BlindTrie
                } else if encseq
                    .equal_length()
                    .is_some_and(|len| len <= SHORTREAD_KEY_UNITS)
                {
                    BucketSort::ShortRead
                } else {
                    BucketSort::Radix
                }
            }
            kind => kind,
        }
    }

    /// Sorts `suffixes`, which agree on their first `depth` symbols
    ///
    /// `offset` is the suffix table position of `suffixes[0]`, used for reporting
    /// unsorted ranges.
    #[allow(clippy::too_many_arguments)]
    pub fn sort_bucket<H: UnsortedRangeHandler>(
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
        if suffixes.len() < 2 {
            return Ok(());
        }
        match self.choose(encseq, suffixes.len()) {
            BucketSort::Radix => self.radix.sort(
                encseq, mode, suffixes, lcps, offset, depth, maxdepth, handler,
            ),
            BucketSort::ShortRead => self.shortread.sort(
                encseq, mode, suffixes, lcps, offset, depth, maxdepth, handler,
            ),
            _ => self.blindtrie.sort(
                encseq,
                mode,
                suffixes,
                lcps,
                offset,
                depth,
                maxdepth,
                InputOrder::Ascending,
                handler,
            ),
        }
    }
}

/// Fails unless the alphabet supports two-bit windows
pub(crate) fn require_twobit(encseq: &EncodedSequence, sorter: &'static str) -> Result<()> {
    if encseq.alphabet().is_twobit() {
        Ok(())
    } else {
        Err(SortError::RequiresTwobit(sorter).into())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::{Alphabet, EncseqBuilder};
    use anyhow::Result;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    /// Naive comparison of two suffixes by symbol keys, capped at `maxdepth`
    pub fn naive_compare(
        encseq: &EncodedSequence,
        mode: ReadMode,
        a: usize,
        b: usize,
        maxdepth: usize,
    ) -> (Ordering, usize) {
        let mut d = 0;
        while d < maxdepth {
            let ka = encseq.symbol_key(a + d, mode);
            let kb = encseq.symbol_key(b + d, mode);
            if ka != kb {
                return (ka.cmp(&kb), d);
            }
            d += 1;
        }
        (a.cmp(&b), maxdepth)
    }

    /// Sorts `positions` naively and returns the order with adjacent LCP values
    pub fn naive_sort(
        encseq: &EncodedSequence,
        mode: ReadMode,
        positions: &[usize],
        maxdepth: usize,
    ) -> (Vec<usize>, Vec<usize>) {
        let mut sorted = positions.to_vec();
        sorted.sort_by(|&a, &b| naive_compare(encseq, mode, a, b, maxdepth).0);
        let mut lcps = vec![0; sorted.len()];
        for i in 1..sorted.len() {
            lcps[i] = naive_compare(encseq, mode, sorted[i - 1], sorted[i], maxdepth).1;
        }
        (sorted, lcps)
    }

    /// Random DNA with a few wildcards and repeats, split into sequences
    pub fn random_dna(seed: u64, len: usize) -> Result<EncodedSequence> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let unit: Vec<u8> = (0..40).map(|_| b"ACGT"[rng.random_range(0..4)]).collect();
        let mut builder = EncseqBuilder::new(Alphabet::dna());
        let mut remaining = len;
        while remaining > 0 {
            let seqlen = rng.random_range(1..=remaining.min(300));
            let mut seq = Vec::with_capacity(seqlen);
            while seq.len() < seqlen {
                match rng.random_range(0..10) {
                    0 => seq.push(b'N'),
                    1 => seq.extend_from_slice(&unit[..rng.random_range(1..40)]),
                    _ => seq.push(b"ACGT"[rng.random_range(0..4)]),
                }
            }
            seq.truncate(seqlen);
            builder.add_sequence(b"", &seq)?;
            remaining -= seqlen;
        }
        Ok(builder.build()?)
    }

    /// Positions whose suffix starts with a regular symbol
    pub fn regular_positions(encseq: &EncodedSequence, mode: ReadMode) -> Vec<usize> {
        (0..encseq.total_length())
            .filter(|&pos| !crate::alphabet::is_special(encseq.get(pos, mode)))
            .collect()
    }

    #[test]
    fn test_report_ties() -> Result<()> {
        let lcps = [0, 5, 2, 5, 5, 1, 5];
        let mut ranges = UnsortedRanges::default();
        report_ties(&lcps, 100, 5, &mut ranges)?;
        assert_eq!(
            ranges.ranges,
            vec![
                UnsortedRange { left: 100, width: 2, depth: 5 },
                UnsortedRange { left: 102, width: 3, depth: 5 },
                UnsortedRange { left: 105, width: 2, depth: 5 },
            ]
        );
        let mut replayed = UnsortedRanges::default();
        ranges.replay(&mut &mut replayed)?;
        assert_eq!(replayed.ranges, ranges.ranges);
        Ok(())
    }

    #[test]
    fn test_dispatch() -> Result<()> {
        let dna = random_dna(1, 500)?;
        let sorter = BucketSorter::new(BucketSort::Auto, 10);
        assert_eq!(sorter.choose(&dna, 5), BucketSort::BlindTrie);
        assert_eq!(sorter.choose(&dna, 50), BucketSort::Radix);

        let mut builder = EncseqBuilder::new(Alphabet::dna());
        for _ in 0..4 {
            builder.add_sequence(b"", b"ACGTACGTAC")?;
        }
        let reads = builder.build()?;
        assert_eq!(sorter.choose(&reads, 50), BucketSort::ShortRead);

        let mut builder = EncseqBuilder::new(Alphabet::protein());
        builder.add_sequence(b"", b"MKVLAAGIVALLLAAGCSS")?;
        let protein = builder.build()?;
        assert_eq!(sorter.choose(&protein, 500), BucketSort::BlindTrie);

        let mut forced = BucketSorter::new(BucketSort::Radix, 10);
        assert_eq!(forced.choose(&protein, 5), BucketSort::Radix);
        let mut suffixes: Vec<usize> = (0..protein.total_length()).collect();
        let mut lcps = vec![0; suffixes.len()];
        assert!(forced
            .sort_bucket(
                &protein,
                ReadMode::Forward,
                &mut suffixes,
                &mut lcps,
                0,
                0,
                usize::MAX,
                &mut IgnoreUnsorted,
            )
            .is_err());
        Ok(())
    }

    #[test]
    fn test_all_sorters_agree() -> Result<()> {
        let encseq = random_dna(2, 1500)?;
        let positions = regular_positions(&encseq, ReadMode::Forward);
        for maxdepth in [3, 12, usize::MAX] {
            let (expected, expected_lcps) =
                naive_sort(&encseq, ReadMode::Forward, &positions, maxdepth);
            for kind in [BucketSort::BlindTrie, BucketSort::Radix, BucketSort::ShortRead] {
                let mut sorter = BucketSorter::new(kind, 0);
                let mut suffixes = positions.clone();
                let mut lcps = vec![0; suffixes.len()];
                let mut ranges = UnsortedRanges::default();
                sorter.sort_bucket(
                    &encseq,
                    ReadMode::Forward,
                    &mut suffixes,
                    &mut lcps,
                    0,
                    0,
                    maxdepth,
                    &mut ranges,
                )?;
                assert_eq!(suffixes, expected, "{kind} maxdepth {maxdepth}");
                assert_eq!(lcps[1..], expected_lcps[1..], "{kind} maxdepth {maxdepth}");
                if maxdepth == usize::MAX {
                    assert!(ranges.ranges.is_empty());
                } else {
                    let tied: usize = ranges.ranges.iter().map(|r| r.width).sum();
                    let expected_tied = (1..lcps.len())
                        .filter(|&i| {
                            lcps[i] == maxdepth || lcps.get(i + 1).is_some_and(|&l| l == maxdepth)
                        })
                        .count()
                        + usize::from(lcps.get(1).is_some_and(|&l| l == maxdepth));
                    assert_eq!(tied, expected_tied, "{kind} maxdepth {maxdepth}");
                }
            }
        }
        Ok(())
    }
}
