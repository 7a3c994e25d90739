//! # Prefix-code bucket table
//!
//! Every suffix is assigned the code of its first `prefixlength` symbols, read as a
//! number in base `numofchars`. A suffix whose prefix runs into a special symbol (or
//! the end of the sequence) after `p ≥ 1` regular symbols gets the code of its
//! `p`-prefix padded with the largest symbol, which places it at the end of that
//! bucket. Suffixes that start with a special symbol are not bucketed.
//!
//! After [`Bcktab::leftborder_partial_sums`], bucket `code` spans
//! `leftborder[code]..leftborder[code + 1]` of the suffix table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::alphabet::is_special;
use crate::encseq::{with_suffix, EncodedSequence, ReadMode};
use crate::error::{BcktabError, Result};
use crate::mapspec::{Backing, FieldBuffer, FieldData, FieldKind, MappedFile, Mapspec};

/// File extension of a persisted bucket table
pub const BCKTAB_SUFFIX: &str = "bck";

/// Current magic number: "BCK1" in ASCII (in little-endian byte order)
#[allow(clippy::unreadable_literal)]
const MAGIC: u32 = 0x314B4342;

/// Current format version of the bucket table layout
const FORMAT: u8 = 1;

/// Size of the bucket table header in bytes
pub const SIZE_HEADER: usize = 32;

/// Largest code any prefix may have
const MAX_CODE: usize = u32::MAX as usize;

/// Prefix classification of one suffix, reported by [`scan_prefixes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixPrefix {
    /// The first `prefixlength` symbols are regular
    Full(usize),
    /// A special symbol or the end follows after `prefix` regular symbols
    Special { code: usize, prefix: usize },
    /// The suffix starts with a special symbol
    SpecialStart,
}

/// Powers of the alphabet size and the padding codes of a prefix length
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CodeTables {
    pub numofchars: usize,
    pub prefixlength: usize,
    /// `basepower[i] = numofchars^i` for `i <= prefixlength`
    pub basepower: Vec<usize>,
    /// `filltable[p] = numofchars^(prefixlength - p) - 1`
    pub filltable: Vec<usize>,
}
impl CodeTables {
    pub fn new(numofchars: usize, prefixlength: usize) -> Result<Self> {
        if prefixlength == 0 {
            return Err(BcktabError::InvalidPrefixLength(prefixlength).into());
        }
        let overflow = || BcktabError::CodeOverflow {
            numofchars,
            prefixlength,
        };
        let mut basepower = Vec::with_capacity(prefixlength + 1);
        let mut power = 1usize;
        basepower.push(power);
        for _ in 0..prefixlength {
            power = power.checked_mul(numofchars).ok_or_else(overflow)?;
            basepower.push(power);
        }
        if numofchars < 2 || power - 1 > MAX_CODE {
            return Err(overflow().into());
        }
        let filltable = (0..=prefixlength)
            .map(|p| basepower[prefixlength - p] - 1)
            .collect();
        Ok(Self {
            numofchars,
            prefixlength,
            basepower,
            filltable,
        })
    }

    pub fn numofallcodes(&self) -> usize {
        self.basepower[self.prefixlength]
    }

    /// Code of a `p`-prefix padded with the largest symbol
    #[inline]
    pub fn padded(&self, prefixcode: usize, p: usize) -> usize {
        prefixcode * self.basepower[self.prefixlength - p] + self.filltable[p]
    }
}

/// Reports the prefix class of every suffix in ascending position order
///
/// One pass over the sequence with a rolling code; `f` receives the position and the
/// class. The suffix at `total_length` is not reported.
pub(crate) fn scan_prefixes<F>(
    encseq: &EncodedSequence,
    mode: ReadMode,
    tables: &CodeTables,
    mut f: F,
) where
    F: FnMut(usize, SuffixPrefix),
{
    let n = tables.numofchars;
    let k = tables.prefixlength;
    let window = tables.basepower[k - 1];
    let mut code = 0usize;
    let mut valid = 0usize;
    let symbols = encseq.symbols(mode).map(Some).chain(std::iter::once(None));
    for (j, symbol) in symbols.enumerate() {
        match symbol {
            Some(c) if !is_special(c) => {
                code = (code % window) * n + c as usize;
                valid = (valid + 1).min(k);
                if valid == k {
                    f(j + 1 - k, SuffixPrefix::Full(code));
                }
            }
            _ => {
                for p in (1..=valid.min(k - 1)).rev() {
                    let prefixcode = code % tables.basepower[p];
                    f(
                        j - p,
                        SuffixPrefix::Special {
                            code: tables.padded(prefixcode, p),
                            prefix: p,
                        },
                    );
                }
                if symbol.is_some() {
                    f(j, SuffixPrefix::SpecialStart);
                }
                code = 0;
                valid = 0;
            }
        }
    }
}

/// Per-code counters, 32 bits wide unless the sequence needs more
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Counters {
    Narrow(Vec<u32>),
    Wide(Vec<u64>),
}
impl Counters {
    fn new(len: usize, wide: bool) -> Self {
        if wide {
            Self::Wide(vec![0; len])
        } else {
            Self::Narrow(vec![0; len])
        }
    }

    #[inline]
    pub fn get(&self, idx: usize) -> usize {
        match self {
            Self::Narrow(v) => v[idx] as usize,
            Self::Wide(v) => v[idx] as usize,
        }
    }

    #[inline]
    fn increment(&mut self, idx: usize) {
        match self {
            Self::Narrow(v) => v[idx] += 1,
            Self::Wide(v) => v[idx] += 1,
        }
    }

    #[inline]
    fn set(&mut self, idx: usize, value: usize) {
        match self {
            Self::Narrow(v) => v[idx] = value as u32,
            Self::Wide(v) => v[idx] = value as u64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Narrow(v) => v.len(),
            Self::Wide(v) => v.len(),
        }
    }

    fn size_of_rep(&self) -> usize {
        match self {
            Self::Narrow(v) => 4 * v.len(),
            Self::Wide(v) => 8 * v.len(),
        }
    }

    fn field(&self) -> FieldData<'_> {
        match self {
            Self::Narrow(v) => FieldData::U32(v),
            Self::Wide(v) => FieldData::U64(v),
        }
    }

    fn from_field(buffer: &FieldBuffer, field: usize, wide: bool) -> Self {
        if wide {
            Self::Wide(buffer.u64s(field).to_vec())
        } else {
            Self::Narrow(buffer.u32s(field).to_vec())
        }
    }
}

/// Layout of one bucket: `left..left + nonspecials + specials`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketBoundaries {
    pub left: usize,
    /// Suffixes whose full prefix is regular; they come first
    pub nonspecials: usize,
    /// Suffixes whose prefix hits a special symbol; they end the bucket
    pub specials: usize,
}

/// Prefix-code bucket table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bcktab {
    tables: CodeTables,
    totallength: usize,
    leftborder: Counters,
    countspecialcodes: Counters,
    /// `distpfxidx[p - 1][prefixcode]` counts special suffixes with a regular prefix of
    /// length `p`, for `1 <= p <= prefixlength - 2`
    distpfxidx: Vec<Counters>,
    partial_sums: bool,
}
impl Bcktab {
    /// Allocates an empty table
    ///
    /// # Arguments
    ///
    /// * `numofchars` - The alphabet size
    /// * `prefixlength` - The number of symbols a code covers
    /// * `totallength` - The length of the sequence, which selects the counter width
    ///
    /// # Errors
    ///
    /// Returns an error if `prefixlength` is zero or `numofchars^prefixlength - 1`
    /// exceeds `u32::MAX`.
    pub fn new(numofchars: usize, prefixlength: usize, totallength: usize) -> Result<Self> {
        Self::with_width(numofchars, prefixlength, totallength, totallength > u32::MAX as usize)
    }

    pub(crate) fn with_width(
        numofchars: usize,
        prefixlength: usize,
        totallength: usize,
        wide: bool,
    ) -> Result<Self> {
        let tables = CodeTables::new(numofchars, prefixlength)?;
        let numofallcodes = tables.numofallcodes();
        let distpfxidx = (1..prefixlength.saturating_sub(1))
            .map(|p| Counters::new(tables.basepower[p], wide))
            .collect();
        Ok(Self {
            leftborder: Counters::new(numofallcodes + 1, wide),
            countspecialcodes: Counters::new(numofallcodes / numofchars, wide),
            distpfxidx,
            tables,
            totallength,
            partial_sums: false,
        })
    }

    /// Counts the prefix codes of all suffixes of `encseq`, sums them up and returns
    /// the finished table
    pub fn build(encseq: &EncodedSequence, prefixlength: usize, mode: ReadMode) -> Result<Self> {
        let mut bcktab = Self::new(
            encseq.alphabet().num_of_chars(),
            prefixlength,
            encseq.total_length(),
        )?;
        bcktab.fill(encseq, mode)?;
        bcktab.leftborder_partial_sums();
        Ok(bcktab)
    }

    /// Counts the prefix codes of all suffixes of `encseq`
    ///
    /// # Errors
    ///
    /// Returns an error if the table was allocated for another alphabet size or length.
    pub fn fill(&mut self, encseq: &EncodedSequence, mode: ReadMode) -> Result<()> {
        if encseq.total_length() != self.totallength {
            return Err(BcktabError::IncompatibleSequence {
                expected: self.totallength,
                got: encseq.total_length(),
            }
            .into());
        }
        if encseq.alphabet().num_of_chars() != self.tables.numofchars {
            return Err(BcktabError::IncompatibleSequence {
                expected: self.tables.numofchars,
                got: encseq.alphabet().num_of_chars(),
            }
            .into());
        }
        let n = self.tables.numofchars;
        let k = self.tables.prefixlength;
        let Self {
            ref tables,
            ref mut leftborder,
            ref mut countspecialcodes,
            ref mut distpfxidx,
            ..
        } = *self;
        scan_prefixes(encseq, mode, tables, |_, prefix| match prefix {
            SuffixPrefix::Full(code) => leftborder.increment(code),
            SuffixPrefix::Special { code, prefix } => {
                leftborder.increment(code);
                countspecialcodes.increment(code / n);
                if prefix + 1 < k {
                    distpfxidx[prefix - 1].increment(code / tables.basepower[k - prefix]);
                }
            }
            SuffixPrefix::SpecialStart => {}
        });
        Ok(())
    }

    /// Turns the per-code counts into exclusive bucket starts
    pub fn leftborder_partial_sums(&mut self) {
        if self.partial_sums {
            return;
        }
        let mut sum = 0;
        for code in 0..self.leftborder.len() {
            let count = self.leftborder.get(code);
            self.leftborder.set(code, sum);
            sum += count;
        }
        self.partial_sums = true;
    }

    #[must_use]
    pub fn numofchars(&self) -> usize {
        self.tables.numofchars
    }

    #[must_use]
    pub fn prefixlength(&self) -> usize {
        self.tables.prefixlength
    }

    #[must_use]
    pub fn numofallcodes(&self) -> usize {
        self.tables.numofallcodes()
    }

    #[must_use]
    pub fn totallength(&self) -> usize {
        self.totallength
    }

    pub(crate) fn code_tables(&self) -> &CodeTables {
        &self.tables
    }

    /// `numofchars^i`
    #[must_use]
    pub fn basepower(&self, i: usize) -> usize {
        self.tables.basepower[i]
    }

    /// Start of bucket `code` (its count before the partial sums)
    #[must_use]
    pub fn leftborder(&self, code: usize) -> usize {
        self.leftborder.get(code)
    }

    /// Number of bucketed suffixes, i.e. all suffixes not starting with a special symbol
    #[must_use]
    pub fn num_of_bucketed(&self) -> usize {
        self.leftborder.get(self.numofallcodes())
    }

    /// Number of special suffixes whose padded code is `code`, indexed by `code / numofchars`
    #[must_use]
    pub fn countspecialcodes(&self, idx: usize) -> usize {
        self.countspecialcodes.get(idx)
    }

    #[must_use]
    pub fn bucket_range(&self, code: usize) -> Range<usize> {
        self.leftborder.get(code)..self.leftborder.get(code + 1)
    }

    #[must_use]
    pub fn calc_bucket_boundaries(&self, code: usize) -> BucketBoundaries {
        let range = self.bucket_range(code);
        let n = self.tables.numofchars;
        let specials = if code % n == n - 1 {
            self.countspecialcodes.get(code / n)
        } else {
            0
        };
        BucketBoundaries {
            left: range.start,
            nonspecials: range.len() - specials,
            specials,
        }
    }

    /// LCP values of the special suffixes at the end of bucket `code`, in bucket order
    ///
    /// Special suffixes are ordered by decreasing regular prefix length; the LCP of
    /// each with its predecessor in the bucket is that length.
    pub fn special_lcps(&self, code: usize, buffer: &mut Vec<usize>) {
        buffer.clear();
        let n = self.tables.numofchars;
        let k = self.tables.prefixlength;
        if code % n != n - 1 {
            return;
        }
        let total = self.countspecialcodes.get(code / n);
        let mut shorter = Vec::with_capacity(self.distpfxidx.len());
        let mut counted = 0;
        for p in (1..k.saturating_sub(1)).rev() {
            let scale = self.tables.basepower[k - p];
            let count = if code % scale == self.tables.filltable[p] {
                self.distpfxidx[p - 1].get(code / scale)
            } else {
                0
            };
            counted += count;
            shorter.push((p, count));
        }
        buffer.extend(std::iter::repeat_n(k - 1, total - counted));
        for (p, count) in shorter {
            buffer.extend(std::iter::repeat_n(p, count));
        }
    }

    /// Width of the widest bucket
    #[must_use]
    pub fn max_bucket_size(&self) -> usize {
        (0..self.numofallcodes())
            .map(|code| self.leftborder.get(code + 1) - self.leftborder.get(code))
            .max()
            .unwrap_or(0)
    }

    /// First code whose bucket starts after `offset`
    ///
    /// Returns `numofallcodes + 1` if no bucket does.
    #[must_use]
    pub fn find_first_larger(&self, offset: usize) -> usize {
        let (mut lo, mut hi) = (0, self.leftborder.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.leftborder.get(mid) <= offset {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Code of the bucket containing suffix table offset `offset`
    #[must_use]
    pub fn bucket_of(&self, offset: usize) -> Option<usize> {
        if offset >= self.num_of_bucketed() {
            return None;
        }
        self.find_first_larger(offset).checked_sub(1)
    }

    /// Code of the first `prefix` symbols of `code`
    #[must_use]
    pub fn code_downscale(&self, code: usize, prefix: usize) -> usize {
        code / self.tables.basepower[self.tables.prefixlength - prefix]
    }

    /// Number of bytes held by the counters
    #[must_use]
    pub fn size_of_rep(&self) -> usize {
        self.leftborder.size_of_rep()
            + self.countspecialcodes.size_of_rep()
            + self.distpfxidx.iter().map(Counters::size_of_rep).sum::<usize>()
    }

    fn is_wide(&self) -> bool {
        matches!(self.leftborder, Counters::Wide(_))
    }

    fn header_bytes(&self) -> [u8; SIZE_HEADER] {
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], MAGIC);
        buffer[4] = FORMAT;
        buffer[5] = u8::from(self.is_wide());
        buffer[6] = u8::from(self.partial_sums);
        LittleEndian::write_u64(&mut buffer[8..16], self.tables.numofchars as u64);
        LittleEndian::write_u64(&mut buffer[16..24], self.tables.prefixlength as u64);
        LittleEndian::write_u64(&mut buffer[24..32], self.totallength as u64);
        buffer
    }

    fn declare_layout(&self) -> (Mapspec, usize) {
        let kind = if self.is_wide() {
            FieldKind::U64
        } else {
            FieldKind::U32
        };
        let width = kind.size_of();
        let mut spec = Mapspec::new();
        spec.add("header", FieldKind::Uchar, SIZE_HEADER)
            .add("leftborder", kind, self.leftborder.len())
            .add("countspecialcodes", kind, self.countspecialcodes.len());
        let mut expected =
            SIZE_HEADER + width * (self.leftborder.len() + self.countspecialcodes.len());
        for counters in &self.distpfxidx {
            spec.add("distpfxidx", kind, counters.len());
            expected += width * counters.len();
        }
        (spec, expected)
    }

    /// Writes the table layout to `writer`
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let (spec, expected) = self.declare_layout();
        let header = self.header_bytes();
        let mut data = vec![
            FieldData::Uchar(&header),
            self.leftborder.field(),
            self.countspecialcodes.field(),
        ];
        data.extend(self.distpfxidx.iter().map(Counters::field));
        spec.write(writer, &data, expected)
    }

    /// Writes the table to `<indexname>.bck`
    pub fn flush<P: AsRef<Path>>(&self, indexname: P) -> Result<()> {
        let path = with_suffix(indexname, BCKTAB_SUFFIX);
        let mut writer = File::create(&path).map(BufWriter::new)?;
        let written = self.write(&mut writer)?;
        writer.flush()?;
        log::debug!(
            "wrote bucket table ({} codes, {} bytes) to {}",
            self.numofallcodes(),
            written,
            path.display()
        );
        Ok(())
    }

    /// Loads a table written by [`Bcktab::flush`]
    ///
    /// The counters are copied out of the mapping.
    pub fn load<P: AsRef<Path>>(indexname: P) -> Result<Self> {
        let mapped = MappedFile::open(with_suffix(indexname, BCKTAB_SUFFIX))?;
        Self::from_backing(Backing::Mapped(mapped))
    }

    /// Restores a table from the bytes written by [`Bcktab::write`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_backing(Backing::from_bytes(bytes))
    }

    fn from_backing(backing: Backing) -> Result<Self> {
        let bytes = backing.as_bytes();
        if bytes.len() < SIZE_HEADER {
            return Err(BcktabError::InvalidSize(bytes.len(), SIZE_HEADER).into());
        }
        let magic = LittleEndian::read_u32(&bytes[0..4]);
        if magic != MAGIC {
            return Err(BcktabError::InvalidMagicNumber(magic).into());
        }
        if bytes[4] != FORMAT {
            return Err(BcktabError::InvalidFormatVersion(bytes[4]).into());
        }
        let wide = bytes[5] != 0;
        let partial_sums = bytes[6] != 0;
        let numofchars = LittleEndian::read_u64(&bytes[8..16]) as usize;
        let prefixlength = LittleEndian::read_u64(&bytes[16..24]) as usize;
        let totallength = LittleEndian::read_u64(&bytes[24..32]) as usize;

        let mut bcktab = Self::with_width(numofchars, prefixlength, totallength, wide)?;
        let (spec, expected) = bcktab.declare_layout();
        let buffer = FieldBuffer::new(backing, &spec, expected)?;
        bcktab.leftborder = Counters::from_field(&buffer, 1, wide);
        bcktab.countspecialcodes = Counters::from_field(&buffer, 2, wide);
        for (idx, counters) in bcktab.distpfxidx.iter_mut().enumerate() {
            *counters = Counters::from_field(&buffer, 3 + idx, wide);
        }
        bcktab.partial_sums = partial_sums;
        Ok(bcktab)
    }
}

/// Prefix length suggested for `totallength` symbols over `numofchars` symbols
///
/// The largest `k` with `numofchars^k <= totallength / 4`, at least 1 and at most the
/// largest prefix length whose codes fit into 32 bits.
#[must_use]
pub fn recommended_prefix_length(numofchars: usize, totallength: usize) -> usize {
    let target = totallength / 4;
    let max = max_prefix_length(numofchars);
    let mut k = 0;
    let mut power = 1usize;
    while k < max {
        match power.checked_mul(numofchars) {
            Some(next) if next <= target => {
                power = next;
                k += 1;
            }
            _ => break,
        }
    }
    k.clamp(1, max.max(1))
}

/// Largest prefix length whose codes fit into 32 bits
#[must_use]
pub fn max_prefix_length(numofchars: usize) -> usize {
    if numofchars < 2 {
        return 1;
    }
    let mut k = 0;
    let mut power = 1usize;
    while let Some(next) = power.checked_mul(numofchars) {
        if next - 1 > MAX_CODE {
            break;
        }
        power = next;
        k += 1;
    }
    k
}
