//! Iteration over maximal runs of special symbols

use std::ops::Range;

use super::{EncodedSequence, ReadMode};

/// A maximal half-open run of special symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecialRange {
    pub start: usize,
    pub end: usize,
}
impl SpecialRange {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}
impl From<Range<usize>> for SpecialRange {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

/// Iterator over the special ranges of an encoded sequence
///
/// Ranges are reported in read-mode coordinates. The iterator walks the stored runs
/// forwards or backwards; in a reverse read mode, walking the stored runs backwards
/// yields ascending read-mode ranges.
#[derive(Debug, Clone)]
pub struct SpecialRangeIterator<'a> {
    encseq: &'a EncodedSequence,
    mode: ReadMode,
    /// Walk stored positions in ascending order
    ascending: bool,
    /// Next raw position to look at; `None` when exhausted
    cursor: Option<usize>,
}
impl<'a> SpecialRangeIterator<'a> {
    pub(crate) fn new(encseq: &'a EncodedSequence, mode: ReadMode, backward: bool) -> Self {
        let total = encseq.total_length();
        // ascending in read-mode order means descending in raw order for reverse modes
        let ascending = backward == mode.is_reverse();
        let cursor = if ascending {
            Some(0)
        } else {
            total.checked_sub(1)
        };
        Self {
            encseq,
            mode,
            ascending,
            cursor,
        }
    }

    fn next_raw(&mut self) -> Option<Range<usize>> {
        let view = self.encseq.view();
        let total = view.total;
        let cursor = self.cursor?;
        if self.ascending {
            let Some(start) = view.next_special(cursor, total) else {
                self.cursor = None;
                return None;
            };
            let end = view.run_end(start);
            self.cursor = (end < total).then_some(end);
            Some(start..end)
        } else {
            let Some(last) = view.prev_special(cursor, 0) else {
                self.cursor = None;
                return None;
            };
            let start = view.run_start(last);
            self.cursor = start.checked_sub(1);
            Some(start..last + 1)
        }
    }
}
impl Iterator for SpecialRangeIterator<'_> {
    type Item = SpecialRange;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.next_raw()?;
        if self.mode.is_reverse() {
            let total = self.encseq.total_length();
            Some(SpecialRange {
                start: total - raw.end,
                end: total - raw.start,
            })
        } else {
            Some(raw.into())
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::encseq::{EncseqBuilder, Strategy};
    use crate::Alphabet;
    use anyhow::Result;

    fn build(strategy: Strategy) -> Result<EncodedSequence> {
        let mut builder = EncseqBuilder::new(Alphabet::dna()).strategy(strategy);
        builder.add_sequence(b"", b"NNACGT")?;
        builder.add_sequence(b"", b"ACNNNG")?;
        builder.add_sequence(b"", b"TTN")?;
        Ok(builder.build()?)
    }

    #[test]
    fn test_forward_and_backward_runs() -> Result<()> {
        // NNACGT$ACNNNG$TTN
        let expected = vec![0..2, 6..7, 9..12, 13..14, 16..17];
        for strategy in Strategy::ALL {
            let encseq = build(strategy)?;
            let forward: Vec<_> = encseq
                .special_ranges(ReadMode::Forward)
                .map(|r| r.as_range())
                .collect();
            assert_eq!(forward, expected, "{strategy}");

            let backward: Vec<_> = encseq
                .special_ranges_rev(ReadMode::Forward)
                .map(|r| r.as_range())
                .collect();
            let mut reversed = expected.clone();
            reversed.reverse();
            assert_eq!(backward, reversed, "{strategy}");
        }
        Ok(())
    }

    #[test]
    fn test_reverse_mode_runs() -> Result<()> {
        let encseq = build(Strategy::BitAccess)?;
        let total = encseq.total_length();
        let ranges: Vec<_> = encseq.special_ranges(ReadMode::Reverse).collect();
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert!(ranges.windows(2).all(|w| w[0].end < w[1].start));
        for range in &ranges {
            for pos in range.as_range() {
                assert!(crate::alphabet::is_special(
                    encseq.get(pos, ReadMode::Reverse)
                ));
            }
        }
        assert_eq!(ranges.last().map(|r| r.end), Some(total));
        Ok(())
    }
}
