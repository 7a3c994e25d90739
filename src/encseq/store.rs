//! Storage strategies of an encoded sequence
//!
//! Every strategy answers the same questions over raw (forward) positions: which symbol
//! is stored, and where the special symbols are. The views borrow typed slices of one
//! [`FieldBuffer`](crate::mapspec::FieldBuffer) and are rebuilt per call.

use std::fmt;
use std::ops::Range;

use crate::alphabet::{SEPARATOR, WILDCARD};

use super::twobit::{twobit_symbol, units_of_twobit};

/// Storage strategy of an encoded sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One byte per symbol
    Direct,
    /// Fixed-width bit packing with escape codes for wildcard and separator
    ByteCompressed,
    /// Two bits per symbol plus a bitmap of special positions
    BitAccess,
    /// Two bits per symbol plus special ranges paginated in pages of 256 positions
    UcharTables,
    /// Two bits per symbol plus special ranges paginated in pages of 65536 positions
    UshortTables,
    /// Two bits per symbol plus special ranges paginated in pages of 2^32 positions
    Uint32Tables,
}
impl Strategy {
    pub const ALL: [Self; 6] = [
        Self::Direct,
        Self::ByteCompressed,
        Self::BitAccess,
        Self::UcharTables,
        Self::UshortTables,
        Self::Uint32Tables,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ByteCompressed => "bytecompress",
            Self::BitAccess => "bit",
            Self::UcharTables => "uchar",
            Self::UshortTables => "ushort",
            Self::Uint32Tables => "uint32",
        }
    }

    /// True if the strategy stores symbols in two bits and needs a 4-symbol alphabet
    #[must_use]
    pub fn is_twobit(self) -> bool {
        !matches!(self, Self::Direct | Self::ByteCompressed)
    }

    #[must_use]
    pub fn table_width(self) -> Option<TableWidth> {
        match self {
            Self::UcharTables => Some(TableWidth::U8),
            Self::UshortTables => Some(TableWidth::U16),
            Self::Uint32Tables => Some(TableWidth::U32),
            _ => None,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Direct => 1,
            Self::ByteCompressed => 2,
            Self::BitAccess => 3,
            Self::UcharTables => 4,
            Self::UshortTables => 5,
            Self::Uint32Tables => 6,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }
}
impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Width of the entries of a paginated special-range table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableWidth {
    U8,
    U16,
    U32,
}
impl TableWidth {
    pub const ALL: [Self; 3] = [Self::U8, Self::U16, Self::U32];

    /// log2 of the page size
    #[must_use]
    pub fn page_bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
        }
    }

    /// Size of one entry in bytes
    #[must_use]
    pub fn entry_size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    #[must_use]
    pub fn page_size(self) -> usize {
        1 << self.page_bits()
    }

    /// Number of pages covering `totallength` positions
    #[must_use]
    pub fn num_of_pages(self, totallength: usize) -> usize {
        (totallength >> self.page_bits()) + 1
    }

    /// Number of table entries a run of special symbols needs: one per page it touches
    #[must_use]
    pub fn entries_for_run(self, run: &Range<usize>) -> usize {
        if run.is_empty() {
            return 0;
        }
        let bits = self.page_bits();
        ((run.end - 1) >> bits) - (run.start >> bits) + 1
    }
}

/// Number of payload bytes a strategy needs
///
/// `specialranges` is the number of table entries for table strategies and the number
/// of maximal special runs otherwise.
#[must_use]
pub fn strategy_size(
    strategy: Strategy,
    totallength: usize,
    specialranges: usize,
    bits_per_symbol: usize,
) -> usize {
    let twobit = 8 * units_of_twobit(totallength);
    match strategy {
        Strategy::Direct => totallength,
        Strategy::ByteCompressed => 8 * (totallength * bits_per_symbol).div_ceil(64),
        Strategy::BitAccess => {
            if specialranges > 0 {
                twobit + 8 * totallength.div_ceil(64)
            } else {
                twobit
            }
        }
        Strategy::UcharTables | Strategy::UshortTables | Strategy::Uint32Tables => {
            let Some(width) = strategy.table_width() else {
                return twobit;
            };
            if specialranges > 0 {
                twobit
                    + 2 * width.entry_size() * specialranges
                    + 8 * width.num_of_pages(totallength)
            } else {
                twobit
            }
        }
    }
}

/// Number of bitmap words for `totallength` positions
pub(crate) fn bitmap_words(totallength: usize) -> usize {
    totallength.div_ceil(64)
}

/// Binary search for the first index in `lo..hi` where `pred` turns false
fn partition(mut lo: usize, mut hi: usize, pred: impl Fn(usize) -> bool) -> usize {
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// A bitmap, most significant bit of each word first
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bits<'a>(pub &'a [u64]);
impl Bits<'_> {
    const TOP: u64 = 1 << 63;

    #[inline]
    pub fn get(&self, pos: usize) -> bool {
        self.0
            .get(pos / 64)
            .is_some_and(|w| w & (Self::TOP >> (pos % 64)) != 0)
    }

    /// First set bit in `from..end`
    pub fn next_set(&self, from: usize, end: usize) -> Option<usize> {
        let mut pos = from;
        while pos < end {
            let unit = pos / 64;
            let word = *self.0.get(unit)?;
            let masked = word & (u64::MAX >> (pos % 64));
            if masked != 0 {
                let found = unit * 64 + masked.leading_zeros() as usize;
                return (found < end).then_some(found);
            }
            pos = (unit + 1) * 64;
        }
        None
    }

    /// First unset bit in `from..end`, or `end`
    pub fn next_unset(&self, from: usize, end: usize) -> usize {
        let mut pos = from;
        while pos < end {
            let unit = pos / 64;
            let Some(&word) = self.0.get(unit) else {
                return pos;
            };
            let masked = !word & (u64::MAX >> (pos % 64));
            if masked != 0 {
                return (unit * 64 + masked.leading_zeros() as usize).min(end);
            }
            pos = (unit + 1) * 64;
        }
        end
    }

    /// Last set bit in `start..=pos`
    pub fn prev_set(&self, pos: usize, start: usize) -> Option<usize> {
        let mut pos = pos;
        loop {
            let unit = pos / 64;
            let word = self.0.get(unit).copied().unwrap_or(0);
            let masked = word & (u64::MAX << (63 - pos % 64));
            if masked != 0 {
                let found = unit * 64 + 63 - masked.trailing_zeros() as usize;
                return (found >= start).then_some(found);
            }
            if unit * 64 <= start {
                return None;
            }
            pos = unit * 64 - 1;
        }
    }

    /// Last unset bit in `..=pos`
    pub fn prev_unset(&self, pos: usize) -> Option<usize> {
        let mut pos = pos;
        loop {
            let unit = pos / 64;
            let Some(&word) = self.0.get(unit) else {
                return Some(pos);
            };
            let masked = !word & (u64::MAX << (63 - pos % 64));
            if masked != 0 {
                return Some(unit * 64 + 63 - masked.trailing_zeros() as usize);
            }
            if unit == 0 {
                return None;
            }
            pos = unit * 64 - 1;
        }
    }
}

/// Fixed-width unsigned values of a special-range table
#[derive(Debug, Clone, Copy)]
pub(crate) enum Units<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
}
impl Units<'_> {
    #[inline]
    pub fn get(&self, idx: usize) -> usize {
        match self {
            Self::U8(v) => v[idx] as usize,
            Self::U16(v) => v[idx] as usize,
            Self::U32(v) => v[idx] as usize,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }
}

/// Paginated run-length table of special ranges
///
/// Entry `i` describes the run `page * pagesize + positions[i]` of length
/// `lengths[i] + 1`; entries never cross a page boundary. `endsubs[page]` is the number
/// of entries in pages `0..=page`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpecialTable<'a> {
    pub width: TableWidth,
    pub positions: Units<'a>,
    pub lengths: Units<'a>,
    pub endsubs: &'a [u64],
}
impl SpecialTable<'_> {
    pub fn num_entries(&self) -> usize {
        self.positions.len()
    }

    fn page_start(&self, page: usize) -> usize {
        if page == 0 {
            0
        } else {
            self.page_end(page - 1)
        }
    }

    fn page_end(&self, page: usize) -> usize {
        self.endsubs
            .get(page)
            .map_or(self.num_entries(), |&e| e as usize)
    }

    fn page_of_entry(&self, idx: usize) -> usize {
        self.endsubs.partition_point(|&e| e as usize <= idx)
    }

    /// Absolute half-open range of entry `idx`
    pub fn entry(&self, idx: usize) -> Range<usize> {
        let base = self.page_of_entry(idx) << self.width.page_bits();
        let start = base + self.positions.get(idx);
        start..start + self.lengths.get(idx) + 1
    }

    /// First entry whose range ends after `pos`
    pub fn first_ending_after(&self, pos: usize) -> Option<usize> {
        let bits = self.width.page_bits();
        let page = pos >> bits;
        let low = pos & ((1 << bits) - 1);
        let (start, end) = (self.page_start(page), self.page_end(page));
        let idx = partition(start, end, |i| {
            self.positions.get(i) + self.lengths.get(i) + 1 <= low
        });
        (idx < self.num_entries()).then_some(idx)
    }

    /// Last entry whose range starts at or before `pos`
    pub fn last_starting_before(&self, pos: usize) -> Option<usize> {
        let bits = self.width.page_bits();
        let page = pos >> bits;
        let low = pos & ((1 << bits) - 1);
        let (start, end) = (self.page_start(page), self.page_end(page));
        let idx = partition(start, end, |i| self.positions.get(i) <= low);
        idx.checked_sub(1)
    }
}

/// Fixed-width bit-packed symbols, most significant bits first
#[derive(Debug, Clone, Copy)]
pub(crate) struct BitPacked<'a> {
    pub words: &'a [u64],
    pub bits: usize,
    pub numofchars: usize,
}
impl BitPacked<'_> {
    #[inline]
    fn value(&self, idx: usize) -> usize {
        let offset = idx * self.bits;
        let unit = offset / 64;
        let rem = offset % 64;
        let high = self.words[unit] << rem;
        let value = if rem + self.bits <= 64 {
            high >> (64 - self.bits)
        } else {
            (high >> (64 - self.bits)) | (self.words[unit + 1] >> (128 - rem - self.bits))
        };
        value as usize
    }

    #[inline]
    pub fn symbol(&self, idx: usize) -> u8 {
        match self.value(idx) {
            v if v < self.numofchars => v as u8,
            v if v == self.numofchars => WILDCARD,
            _ => SEPARATOR,
        }
    }
}

/// Packs symbol codes with `bits` bits each
pub(crate) fn bitpack(symbols: &[u8], bits: usize, numofchars: usize) -> Vec<u64> {
    let mut words = vec![0u64; (symbols.len() * bits).div_ceil(64)];
    for (idx, &code) in symbols.iter().enumerate() {
        let value = match code {
            WILDCARD => numofchars as u64,
            SEPARATOR => numofchars as u64 + 1,
            c => u64::from(c),
        };
        let offset = idx * bits;
        let unit = offset / 64;
        let rem = offset % 64;
        if rem + bits <= 64 {
            words[unit] |= value << (64 - rem - bits);
        } else {
            let spill = rem + bits - 64;
            words[unit] |= value >> spill;
            words[unit + 1] |= value << (64 - spill);
        }
    }
    words
}

/// Strategy-specific borrowed payload
#[derive(Debug, Clone, Copy)]
pub(crate) enum StoreKind<'a> {
    Direct(&'a [u8]),
    ByteCompressed(BitPacked<'a>),
    BitAccess {
        twobit: &'a [u64],
        specialbits: Bits<'a>,
    },
    Tables {
        twobit: &'a [u64],
        table: SpecialTable<'a>,
    },
}

/// Raw-position queries over one storage strategy
#[derive(Debug, Clone, Copy)]
pub(crate) struct StoreView<'a> {
    pub total: usize,
    pub kind: StoreKind<'a>,
}
impl StoreView<'_> {
    /// Packed words, if the strategy stores two bits per symbol
    pub fn twobit(&self) -> Option<&[u64]> {
        match self.kind {
            StoreKind::BitAccess { twobit, .. } | StoreKind::Tables { twobit, .. } => Some(twobit),
            _ => None,
        }
    }

    #[inline]
    fn special_marker(twobit: &[u64], pos: usize) -> u8 {
        if twobit_symbol(twobit, pos) == 1 {
            SEPARATOR
        } else {
            WILDCARD
        }
    }

    #[inline]
    pub fn symbol(&self, pos: usize) -> u8 {
        match self.kind {
            StoreKind::Direct(bytes) => bytes[pos],
            StoreKind::ByteCompressed(packed) => packed.symbol(pos),
            StoreKind::BitAccess {
                twobit,
                specialbits,
            } => {
                if specialbits.get(pos) {
                    Self::special_marker(twobit, pos)
                } else {
                    twobit_symbol(twobit, pos)
                }
            }
            StoreKind::Tables { twobit, table } => {
                if self.is_special_in_table(&table, pos) {
                    Self::special_marker(twobit, pos)
                } else {
                    twobit_symbol(twobit, pos)
                }
            }
        }
    }

    fn is_special_in_table(&self, table: &SpecialTable<'_>, pos: usize) -> bool {
        table
            .last_starting_before(pos)
            .is_some_and(|idx| table.entry(idx).end > pos)
    }

    #[inline]
    pub fn is_special(&self, pos: usize) -> bool {
        match self.kind {
            StoreKind::BitAccess { specialbits, .. } => specialbits.get(pos),
            StoreKind::Tables { table, .. } => self.is_special_in_table(&table, pos),
            _ => crate::alphabet::is_special(self.symbol(pos)),
        }
    }

    /// First special position in `pos..end`
    pub fn next_special(&self, pos: usize, end: usize) -> Option<usize> {
        let end = end.min(self.total);
        if pos >= end {
            return None;
        }
        match self.kind {
            StoreKind::BitAccess { specialbits, .. } => specialbits.next_set(pos, end),
            StoreKind::Tables { table, .. } => {
                let idx = table.first_ending_after(pos)?;
                let found = table.entry(idx).start.max(pos);
                (found < end).then_some(found)
            }
            _ => (pos..end).find(|&p| self.is_special(p)),
        }
    }

    /// Last special position in `start..=pos`
    pub fn prev_special(&self, pos: usize, start: usize) -> Option<usize> {
        if pos >= self.total || pos < start {
            return None;
        }
        match self.kind {
            StoreKind::BitAccess { specialbits, .. } => specialbits.prev_set(pos, start),
            StoreKind::Tables { table, .. } => {
                let idx = table.last_starting_before(pos)?;
                let found = (table.entry(idx).end - 1).min(pos);
                (found >= start).then_some(found)
            }
            _ => (start..=pos).rev().find(|&p| self.is_special(p)),
        }
    }

    /// End of the run of special symbols containing the special position `pos`
    pub fn run_end(&self, pos: usize) -> usize {
        match self.kind {
            StoreKind::BitAccess { specialbits, .. } => {
                specialbits.next_unset(pos, self.total)
            }
            StoreKind::Tables { table, .. } => {
                let Some(mut idx) = table.first_ending_after(pos) else {
                    return pos;
                };
                let mut end = table.entry(idx).end;
                while idx + 1 < table.num_entries() {
                    let next = table.entry(idx + 1);
                    if next.start != end {
                        break;
                    }
                    end = next.end;
                    idx += 1;
                }
                end
            }
            _ => (pos..self.total)
                .find(|&p| !self.is_special(p))
                .unwrap_or(self.total),
        }
    }

    /// Start of the run of special symbols containing the special position `pos`
    pub fn run_start(&self, pos: usize) -> usize {
        match self.kind {
            StoreKind::BitAccess { specialbits, .. } => {
                specialbits.prev_unset(pos).map_or(0, |p| p + 1)
            }
            StoreKind::Tables { table, .. } => {
                let Some(mut idx) = table.last_starting_before(pos) else {
                    return pos;
                };
                let mut start = table.entry(idx).start;
                while idx > 0 {
                    let prev = table.entry(idx - 1);
                    if prev.end != start {
                        break;
                    }
                    start = prev.start;
                    idx -= 1;
                }
                start
            }
            _ => (0..=pos)
                .rev()
                .find(|&p| !self.is_special(p))
                .map_or(0, |p| p + 1),
        }
    }
}

/// Special-range table contents before serialization
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct TableParts {
    pub positions: Vec<u32>,
    pub lengths: Vec<u32>,
    pub endsubs: Vec<u64>,
}
impl TableParts {
    /// Splits maximal runs into per-page entries
    pub fn from_runs(width: TableWidth, runs: &[Range<usize>], totallength: usize) -> Self {
        let bits = width.page_bits();
        let pagesize = width.page_size();
        let mut parts = Self::default();
        let mut pagecounts = vec![0u64; width.num_of_pages(totallength)];
        for run in runs {
            let mut start = run.start;
            while start < run.end {
                let page = start >> bits;
                let pageend = ((page + 1) * pagesize).min(run.end);
                parts.positions.push((start & (pagesize - 1)) as u32);
                parts.lengths.push((pageend - start - 1) as u32);
                pagecounts[page] += 1;
                start = pageend;
            }
        }
        let mut sum = 0;
        parts.endsubs = pagecounts
            .into_iter()
            .map(|count| {
                sum += count;
                sum
            })
            .collect();
        parts
    }

    pub fn narrow_u8(values: &[u32]) -> Vec<u8> {
        values.iter().map(|&v| v as u8).collect()
    }

    pub fn narrow_u16(values: &[u32]) -> Vec<u16> {
        values.iter().map(|&v| v as u16).collect()
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_bitmap_queries() {
        let mut words = vec![0u64; 3];
        for pos in [3usize, 4, 5, 63, 64, 130] {
            words[pos / 64] |= Bits::TOP >> (pos % 64);
        }
        let bits = Bits(&words);
        assert!(bits.get(4));
        assert!(!bits.get(6));
        assert_eq!(bits.next_set(0, 192), Some(3));
        assert_eq!(bits.next_set(6, 192), Some(63));
        assert_eq!(bits.next_set(65, 192), Some(130));
        assert_eq!(bits.next_set(65, 130), None);
        assert_eq!(bits.next_unset(3, 192), 6);
        assert_eq!(bits.next_unset(63, 192), 65);
        assert_eq!(bits.prev_set(62, 0), Some(5));
        assert_eq!(bits.prev_set(129, 0), Some(64));
        assert_eq!(bits.prev_set(2, 0), None);
        assert_eq!(bits.prev_set(62, 6), None);
        assert_eq!(bits.prev_unset(5), Some(2));
        assert_eq!(bits.prev_unset(64), Some(62));
    }

    #[test]
    fn test_table_split_at_pages() {
        let runs = vec![10..12, 250..300, 600..601];
        let parts = TableParts::from_runs(TableWidth::U8, &runs, 700);
        assert_eq!(parts.positions, vec![10, 250, 0, 88]);
        assert_eq!(parts.lengths, vec![1, 5, 43, 0]);
        assert_eq!(parts.endsubs, vec![2, 3, 4]);

        let positions = TableParts::narrow_u8(&parts.positions);
        let lengths = TableParts::narrow_u8(&parts.lengths);
        let table = SpecialTable {
            width: TableWidth::U8,
            positions: Units::U8(&positions),
            lengths: Units::U8(&lengths),
            endsubs: &parts.endsubs,
        };
        assert_eq!(table.entry(1), 250..256);
        assert_eq!(table.entry(2), 256..300);
        assert_eq!(table.entry(3), 600..601);
        assert_eq!(table.first_ending_after(12), Some(1));
        assert_eq!(table.first_ending_after(299), Some(2));
        assert_eq!(table.first_ending_after(300), Some(3));
        assert_eq!(table.first_ending_after(601), None);
        assert_eq!(table.last_starting_before(9), None);
        assert_eq!(table.last_starting_before(255), Some(1));
        assert_eq!(table.last_starting_before(599), Some(2));

        let view = StoreView {
            total: 700,
            kind: StoreKind::Tables {
                twobit: &[0u64; 22],
                table,
            },
        };
        assert_eq!(view.next_special(13, 700), Some(250));
        assert_eq!(view.run_end(251), 300);
        assert_eq!(view.run_start(299), 250);
        assert_eq!(view.prev_special(500, 0), Some(299));
        assert!(view.is_special(256));
        assert!(!view.is_special(300));
    }

    #[test]
    fn test_bitpack_roundtrip() {
        let symbols: Vec<u8> = (0..200u32)
            .map(|i| match i % 23 {
                0 => WILDCARD,
                1 => SEPARATOR,
                x => (x % 20) as u8,
            })
            .collect();
        let words = bitpack(&symbols, 5, 20);
        let packed = BitPacked {
            words: &words,
            bits: 5,
            numofchars: 20,
        };
        for (idx, &code) in symbols.iter().enumerate() {
            assert_eq!(packed.symbol(idx), code);
        }
    }

    #[test]
    fn test_entries_for_run() {
        assert_eq!(TableWidth::U8.entries_for_run(&(0..256)), 1);
        assert_eq!(TableWidth::U8.entries_for_run(&(255..257)), 2);
        assert_eq!(TableWidth::U8.entries_for_run(&(10..600)), 3);
        assert_eq!(TableWidth::U16.entries_for_run(&(10..600)), 1);
    }
}
