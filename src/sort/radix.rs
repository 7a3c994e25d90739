//! MSD radix sort over packed two-bit windows
//!
//! Each pass reads the next four symbols of every suffix from one packed window and
//! distributes the suffixes into 1025 buckets: 256 four-symbol codes times four
//! overflow tags, plus one escape bucket. A suffix that reaches a special symbol (or the
//! end) after `u < 4` symbols gets the code of those `u` symbols padded with the largest
//! symbol and the tag `4 - u`, which places it right after all suffixes continuing with
//! that padding; one that starts with a special symbol goes to the escape bucket.
//! Buckets of regular codes are pushed back onto an explicit work stack four symbols
//! deeper; narrow ones finish by insertion sort.

use crate::encseq::{EncodedSequence, ReadMode, TwobitWindow};
use crate::error::Result;

use super::{
    finish_tied, insertion_sort, report_ties, require_twobit, SortContext, UnsortedRangeHandler,
};

/// Symbols consumed per pass
const SYMBOLS_PER_PASS: usize = 4;

/// Number of distinct four-symbol codes
const NUM_CODES: usize = 256;

/// Index of the bucket for suffixes starting with a special symbol
const ESCAPE_BUCKET: usize = NUM_CODES * SYMBOLS_PER_PASS;

const NUM_BUCKETS: usize = ESCAPE_BUCKET + 1;

/// Ranges up to this width are finished by insertion sort
pub const INSERTION_SORT_MAX: usize = 31;

/// Number of leading symbols two four-symbol codes share, indexed by their XOR
static XOR_LCP: [u8; NUM_CODES] = xor_lcp_table();

const fn xor_lcp_table() -> [u8; NUM_CODES] {
    let mut table = [0u8; NUM_CODES];
    let mut x = 0;
    while x < NUM_CODES {
        let mut common = 0;
        while common < SYMBOLS_PER_PASS && (x >> (6 - 2 * common)) & 3 == 0 {
            common += 1;
        }
        table[x] = common as u8;
        x += 1;
    }
    table
}

/// Bucket of a window when at most `limit` symbols may be looked at
#[inline]
fn bucket_of(window: &TwobitWindow, limit: usize) -> usize {
    let units = (window.units as usize).min(SYMBOLS_PER_PASS);
    if units >= limit {
        // regular up to the depth bound or for the whole pass
        let code = (window.tbe >> (64 - 2 * limit)) << (2 * (SYMBOLS_PER_PASS - limit));
        (code as usize) * SYMBOLS_PER_PASS
    } else if units == 0 {
        ESCAPE_BUCKET
    } else {
        let missing = SYMBOLS_PER_PASS - units;
        let code = ((window.tbe >> (64 - 2 * units)) << (2 * missing)) | ((1 << (2 * missing)) - 1);
        (code as usize) * SYMBOLS_PER_PASS + missing
    }
}

/// Number of symbols the suffixes of a bucket have in common within this pass
#[inline]
fn bucket_units(bucket: usize, limit: usize) -> usize {
    match bucket % SYMBOLS_PER_PASS {
        0 => limit,
        missing => SYMBOLS_PER_PASS - missing,
    }
}

/// Length of the common prefix of two different buckets within this pass
#[inline]
fn bucket_lcp(a: usize, b: usize, limit: usize) -> usize {
    if a == ESCAPE_BUCKET || b == ESCAPE_BUCKET {
        return 0;
    }
    let xor = (a / SYMBOLS_PER_PASS) ^ (b / SYMBOLS_PER_PASS);
    (XOR_LCP[xor] as usize)
        .min(bucket_units(a, limit))
        .min(bucket_units(b, limit))
}

#[derive(Debug, Clone, Copy)]
struct WorkItem {
    left: usize,
    width: usize,
    depth: usize,
}

/// Reusable radix sorter for 4-symbol alphabets
#[derive(Debug)]
pub struct RadixSortString {
    stack: Vec<WorkItem>,
    keys: Vec<u16>,
    buffer: Vec<usize>,
    counts: Vec<usize>,
}
impl Default for RadixSortString {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            keys: Vec::new(),
            buffer: Vec::new(),
            counts: vec![0; NUM_BUCKETS],
        }
    }
}
impl RadixSortString {
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
        require_twobit(encseq, "radix")?;
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
        self.stack.clear();
        self.stack.push(WorkItem {
            left: 0,
            width: suffixes.len(),
            depth,
        });
        while let Some(item) = self.stack.pop() {
            let range = item.left..item.left + item.width;
            if item.width <= INSERTION_SORT_MAX {
                insertion_sort(&ctx, &mut suffixes[range.clone()], &mut lcps[range], item.depth);
                continue;
            }
            self.pass(&ctx, suffixes, lcps, item);
        }
        report_ties(lcps, offset, maxdepth, handler)
    }

    /// Distributes one work item by its next four symbols
    fn pass(
        &mut self,
        ctx: &SortContext<'_>,
        suffixes: &mut [usize],
        lcps: &mut [usize],
        item: WorkItem,
    ) {
        let WorkItem { left, width, depth } = item;
        let limit = (ctx.maxdepth - depth).min(SYMBOLS_PER_PASS);
        let range = left..left + width;

        self.keys.clear();
        self.counts.fill(0);
        for &pos in &suffixes[range.clone()] {
            let window = ctx.encseq.extract_twobit(pos + depth, ctx.mode);
            let bucket = bucket_of(&window, limit);
            self.keys.push(bucket as u16);
            self.counts[bucket] += 1;
        }

        // exclusive starts, then stable scatter
        let mut sum = 0;
        for count in &mut self.counts {
            let c = *count;
            *count = sum;
            sum += c;
        }
        self.buffer.clear();
        self.buffer.resize(width, 0);
        for (&pos, &key) in suffixes[range.clone()].iter().zip(&self.keys) {
            let slot = &mut self.counts[key as usize];
            self.buffer[*slot] = pos;
            *slot += 1;
        }
        suffixes[range].copy_from_slice(&self.buffer);

        // after the scatter counts[b] is the end of bucket b
        let mut start = 0;
        let mut previous: Option<usize> = None;
        for bucket in 0..NUM_BUCKETS {
            let end = self.counts[bucket];
            if end == start {
                continue;
            }
            let sub = left + start..left + end;
            if let Some(prev) = previous {
                lcps[sub.start] = depth + bucket_lcp(prev, bucket, limit);
            }
            if sub.len() > 1 {
                let units = if bucket == ESCAPE_BUCKET {
                    0
                } else {
                    bucket_units(bucket, limit)
                };
                let finished = bucket == ESCAPE_BUCKET
                    || bucket % SYMBOLS_PER_PASS != 0
                    || depth + units >= ctx.maxdepth;
                if finished {
                    // ended by special symbols or tied at the bound: position order
                    suffixes[sub.clone()].sort_unstable();
                    for lcp in &mut lcps[sub.start + 1..sub.end] {
                        *lcp = depth + units;
                    }
                } else {
                    self.stack.push(WorkItem {
                        left: sub.start,
                        width: sub.len(),
                        depth: depth + SYMBOLS_PER_PASS,
                    });
                }
            }
            previous = Some(bucket);
            start = end;
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::sort::testing::{naive_sort, random_dna, regular_positions};
    use crate::sort::UnsortedRanges;
    use crate::{Alphabet, EncseqBuilder};
    use anyhow::Result;

    #[test]
    fn test_xor_table() {
        assert_eq!(XOR_LCP[0], 4);
        assert_eq!(XOR_LCP[0b00_00_00_01], 3);
        assert_eq!(XOR_LCP[0b00_00_10_00], 2);
        assert_eq!(XOR_LCP[0b00_11_00_00], 1);
        assert_eq!(XOR_LCP[0b01_00_00_00], 0);
    }

    #[test]
    fn test_bucket_order() {
        let window = |symbols: &[u8], units: u32| {
            let tbe = symbols
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, &c)| acc | (u64::from(c) << (62 - 2 * i)));
            TwobitWindow {
                tbe,
                units,
                position: 0,
            }
        };
        // ATTT < ATT$ < AT$ < A$ < CAAA < $
        let keys = [
            bucket_of(&window(&[0, 3, 3, 3, 1], 32), 4),
            bucket_of(&window(&[0, 3, 3], 3), 4),
            bucket_of(&window(&[0, 3], 2), 4),
            bucket_of(&window(&[0], 1), 4),
            bucket_of(&window(&[1, 0, 0, 0], 32), 4),
            bucket_of(&window(&[], 0), 4),
        ];
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "{keys:?}");
        assert_eq!(keys[5], ESCAPE_BUCKET);
        assert_eq!(bucket_lcp(keys[0], keys[1], 4), 3);
        assert_eq!(bucket_lcp(keys[1], keys[2], 4), 2);
        assert_eq!(bucket_lcp(keys[3], keys[4], 4), 0);

        // two symbols before the bound: AG < AT < A$
        let truncated = bucket_of(&window(&[0, 2, 1], 32), 2);
        let last = bucket_of(&window(&[0, 3, 3, 3], 32), 2);
        let special = bucket_of(&window(&[0], 1), 2);
        assert!(truncated < last && last < special);
        assert_eq!(bucket_lcp(truncated, special, 2), 1);
        assert_eq!(bucket_lcp(truncated, last, 2), 1);
    }

    #[test]
    fn test_matches_naive() -> Result<()> {
        let encseq = random_dna(31, 5000)?;
        for mode in ReadMode::ALL {
            let positions = regular_positions(&encseq, mode);
            for maxdepth in [2, 6, 33, usize::MAX] {
                let (expected, expected_lcps) = naive_sort(&encseq, mode, &positions, maxdepth);
                let mut sorter = RadixSortString::new();
                let mut suffixes = positions.clone();
                let mut lcps = vec![0; suffixes.len()];
                let mut ranges = UnsortedRanges::default();
                sorter.sort(
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
                for range in &ranges.ranges {
                    assert!(range.width > 1);
                    assert!(lcps[range.left + 1..range.left + range.width]
                        .iter()
                        .all(|&l| l == maxdepth));
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_long_repeat() -> Result<()> {
        // long runs need many passes
        let mut builder = EncseqBuilder::new(Alphabet::dna());
        builder.add_sequence(b"", &b"ACGTTGCA".repeat(40))?;
        builder.add_sequence(b"", &b"A".repeat(150))?;
        let encseq = builder.build()?;
        let positions = regular_positions(&encseq, ReadMode::Forward);
        let (expected, expected_lcps) =
            naive_sort(&encseq, ReadMode::Forward, &positions, usize::MAX);
        let mut suffixes = positions.clone();
        let mut lcps = vec![0; suffixes.len()];
        RadixSortString::new().sort(
            &encseq,
            ReadMode::Forward,
            &mut suffixes,
            &mut lcps,
            0,
            0,
            usize::MAX,
            &mut crate::sort::IgnoreUnsorted,
        )?;
        assert_eq!(suffixes, expected);
        assert_eq!(lcps[1..], expected_lcps[1..]);
        Ok(())
    }
}
