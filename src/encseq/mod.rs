//! # Encoded sequences
//!
//! An [`EncodedSequence`] is the concatenation of all input sequences, separated by a
//! single [`SEPARATOR`](crate::alphabet::SEPARATOR), stored in one of several
//! [`Strategy`] layouts. It is built once with an [`EncseqBuilder`] or mapped read-only
//! from a file written by [`EncodedSequence::flush`], and is immutable afterwards.
//!
//! Every symbol query takes a [`ReadMode`], so reversed and complemented views are
//! served from the same buffer by translating positions at access time.
//!
//! ## File layout
//!
//! The file is a [`Mapspec`] layout whose first field is a 64-byte [`EncseqHeader`]
//! and whose second field is the [`SpecialCharInfo`]. Together they determine the
//! count of every following field, so the layout can be declared before the rest of
//! the file is touched:
//!
//! | Field | Kind | Count |
//! |---|---|---|
//! | header | `Uchar` | 64 |
//! | special character info | `U64` | 9 |
//! | symbol map | `Uchar` | 256 |
//! | characters | `Uchar` | alphabet size |
//! | file names | `Char` | NUL-terminated names |
//! | file lengths | `U64` | 2 per file |
//! | character distribution | `U64` | alphabet size |
//! | separator positions | `U64` | sequences - 1 |
//! | descriptions | `Char` | description bytes |
//! | description ends | `U64` | sequences, if descriptions are stored |
//! | payload | strategy dependent | |

mod builder;
mod header;
mod special;
mod store;
mod twobit;

pub use builder::EncseqBuilder;
pub use header::{EncseqHeader, FileLength, SpecialCharInfo, SIZE_HEADER, SIZE_SPECIALCHARINFO};
pub use special::{SpecialRange, SpecialRangeIterator};
pub use store::{strategy_size, Strategy, TableWidth};
pub use twobit::{compare_twobit, reverse_twobit, units_of_twobit, TwobitWindow, UNITS_IN_TWOBIT};

pub(crate) use twobit::{compare_window_step, WindowCmp};

use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::alphabet::{is_special, Alphabet};
use crate::error::{EncseqError, Result};
use crate::mapspec::{Backing, FieldBuffer, FieldData, FieldKind, MappedFile, Mapspec};

use store::{BitPacked, Bits, SpecialTable, StoreKind, StoreView, Units};
use twobit::{twobit_word_at, twobit_word_before};

/// File extension of a persisted encoded sequence
pub const ENCSEQ_SUFFIX: &str = "esq";

/// Comparison key of special symbols and of positions past the end
///
/// A special symbol at position `p` has key `SPECIAL_KEY_BASE + p`, so two different
/// special positions never compare equal and every special is greater than every
/// regular symbol.
pub const SPECIAL_KEY_BASE: u64 = 256;

// fields 0 and 1 hold the header and the special character info
const FIELD_SYMBOLMAP: usize = 2;
const FIELD_CHARACTERS: usize = 3;
const FIELD_FILENAMES: usize = 4;
const FIELD_FILELENGTHS: usize = 5;
const FIELD_CHARDIST: usize = 6;
const FIELD_SEPPOS: usize = 7;
const FIELD_DESCRIPTIONS: usize = 8;
const FIELD_DESCENDS: usize = 9;
const FIELD_PAYLOAD: usize = 10;

/// Appends `.suffix` to an index name
#[must_use]
pub fn with_suffix<P: AsRef<Path>>(indexname: P, suffix: &str) -> PathBuf {
    let mut name = indexname.as_ref().as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Direction and complementation applied to positions and symbols
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadMode {
    #[default]
    Forward,
    /// Position `i` reads stored position `total_length - 1 - i`
    Reverse,
    /// Regular symbols are complemented
    Complement,
    ReverseComplement,
}
impl ReadMode {
    pub const ALL: [Self; 4] = [
        Self::Forward,
        Self::Reverse,
        Self::Complement,
        Self::ReverseComplement,
    ];

    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse | Self::ReverseComplement)
    }

    #[must_use]
    pub fn is_complement(self) -> bool {
        matches!(self, Self::Complement | Self::ReverseComplement)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Forward => "fwd",
            Self::Reverse => "rev",
            Self::Complement => "cpl",
            Self::ReverseComplement => "rcl",
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Forward => 0,
            Self::Reverse => 1,
            Self::Complement => 2,
            Self::ReverseComplement => 3,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.tag() == tag)
    }
}
impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declares the field layout described by a header and returns it with the payload
/// size the header implies
fn declare_layout(header: &EncseqHeader, info: &SpecialCharInfo) -> (Mapspec, usize) {
    let total = header.totallength as usize;
    let numofchars = header.numofchars as usize;
    let numofsequences = header.numofsequences as usize;
    let numoffiles = header.numofdbfiles as usize;
    let filenames = header.lengthofdbfilenames as usize;
    let descbytes = header.descriptionlength as usize;
    let descends = if header.descriptions {
        numofsequences
    } else {
        0
    };
    let separators = numofsequences.saturating_sub(1);
    let specialranges = info.specialranges as usize;

    let mut spec = Mapspec::new();
    spec.add("header", FieldKind::Uchar, SIZE_HEADER)
        .add("specialcharinfo", FieldKind::U64, SpecialCharInfo::NUM_WORDS)
        .add("symbolmap", FieldKind::Uchar, 256)
        .add("characters", FieldKind::Uchar, numofchars)
        .add("filenames", FieldKind::Char, filenames)
        .add("filelengths", FieldKind::U64, 2 * numoffiles)
        .add("characterdistribution", FieldKind::U64, numofchars)
        .add("separatorpositions", FieldKind::U64, separators)
        .add("descriptions", FieldKind::Char, descbytes)
        .add("descriptionends", FieldKind::U64, descends);

    let twobit_units = units_of_twobit(total);
    match header.strategy {
        Strategy::Direct => {
            spec.add("bytesequence", FieldKind::Uchar, total);
        }
        Strategy::ByteCompressed => {
            let bits = header.bits_per_symbol as usize;
            spec.add("bitpacked", FieldKind::Bitelem, (total * bits).div_ceil(64));
        }
        Strategy::BitAccess => {
            spec.add("twobitencoding", FieldKind::Twobitencoding, twobit_units);
            if specialranges > 0 {
                spec.add("specialbits", FieldKind::Bitsequence, store::bitmap_words(total));
            }
        }
        Strategy::UcharTables | Strategy::UshortTables | Strategy::Uint32Tables => {
            spec.add("twobitencoding", FieldKind::Twobitencoding, twobit_units);
            if let (Some(width), true) = (header.strategy.table_width(), specialranges > 0) {
                let kind = match width {
                    TableWidth::U8 => FieldKind::Uchar,
                    TableWidth::U16 => FieldKind::U16,
                    TableWidth::U32 => FieldKind::U32,
                };
                spec.add("specialpositions", kind, specialranges)
                    .add("speciallengths", kind, specialranges)
                    .add("endspecialsubs", FieldKind::U64, width.num_of_pages(total));
            }
        }
    }

    let expected = SIZE_HEADER
        + SIZE_SPECIALCHARINFO
        + 256
        + numofchars
        + filenames
        + 8 * 2 * numoffiles
        + 8 * numofchars
        + 8 * separators
        + descbytes
        + 8 * descends
        + strategy_size(
            header.strategy,
            total,
            specialranges,
            header.bits_per_symbol as usize,
        );
    (spec, expected)
}

/// A compact, immutable store of concatenated sequences
#[derive(Debug, Clone)]
pub struct EncodedSequence {
    header: EncseqHeader,
    info: SpecialCharInfo,
    alphabet: Alphabet,
    buffer: FieldBuffer,
}
impl EncodedSequence {
    /// Lays out the given fields into an owned buffer
    ///
    /// `data` holds every field after the header and the special character info, in
    /// layout order.
    pub(crate) fn from_parts(
        header: EncseqHeader,
        info: SpecialCharInfo,
        alphabet: Alphabet,
        data: &[FieldData<'_>],
    ) -> Result<Self> {
        let (spec, expected) = declare_layout(&header, &info);
        let header_bytes = header.to_bytes();
        let info_words = info.to_words();
        let mut fields = Vec::with_capacity(data.len() + 2);
        fields.push(FieldData::Uchar(&header_bytes));
        fields.push(FieldData::U64(&info_words));
        fields.extend_from_slice(data);
        let buffer = FieldBuffer::from_fields(&spec, &fields, expected)?;
        Ok(Self {
            header,
            info,
            alphabet,
            buffer,
        })
    }

    fn from_backing(backing: Backing) -> Result<Self> {
        let bytes = backing.as_bytes();
        let header = EncseqHeader::from_buffer(bytes)?;
        let info = SpecialCharInfo::from_buffer(bytes.get(SIZE_HEADER..).unwrap_or_default())?;
        if header.strategy.is_twobit() && header.numofchars != 4 {
            return Err(EncseqError::IncompatibleStrategy {
                strategy: header.strategy.name(),
                numofchars: header.numofchars as usize,
            }
            .into());
        }
        let (spec, expected) = declare_layout(&header, &info);
        let buffer = FieldBuffer::new(backing, &spec, expected)?;
        let alphabet = Alphabet::from_parts(
            buffer.bytes(FIELD_SYMBOLMAP),
            buffer.bytes(FIELD_CHARACTERS),
            header.wildcard_show,
            header.complement,
        )?;
        Ok(Self {
            header,
            info,
            alphabet,
            buffer,
        })
    }

    /// Restores an encoded sequence from the bytes written by [`EncodedSequence::write`]
    ///
    /// The bytes are copied into word-aligned storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or the buffer does not have exactly
    /// the size its header declares.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_backing(Backing::from_bytes(bytes))
    }

    /// Maps `<indexname>.esq` read-only
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be mapped, its header is invalid, or its size
    /// differs from the size its header declares.
    pub fn map<P: AsRef<Path>>(indexname: P) -> Result<Self> {
        let path = with_suffix(indexname, ENCSEQ_SUFFIX);
        let mapped = MappedFile::open(&path)?;
        let encseq = Self::from_backing(Backing::Mapped(mapped))?;
        log::debug!(
            "mapped {} ({} symbols, {})",
            path.display(),
            encseq.total_length(),
            encseq.strategy()
        );
        Ok(encseq)
    }

    /// Writes the complete layout to `writer`
    ///
    /// # Returns
    ///
    /// The number of bytes written
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let bytes = self.buffer.as_bytes();
        writer.write_all(bytes)?;
        Ok(bytes.len())
    }

    /// Writes the layout to `<indexname>.esq`
    pub fn flush<P: AsRef<Path>>(&self, indexname: P) -> Result<()> {
        let path = with_suffix(indexname, ENCSEQ_SUFFIX);
        let mut writer = File::create(&path).map(BufWriter::new)?;
        let written = self.write(&mut writer)?;
        writer.flush()?;
        log::debug!("wrote {} bytes to {}", written, path.display());
        Ok(())
    }

    /// True if the layout lives in a memory-mapped file
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.buffer.backing().is_mapped()
    }

    /// Strategy-specific view of the payload
    pub(crate) fn view(&self) -> StoreView<'_> {
        let total = self.total_length();
        let buffer = &self.buffer;
        let has_ranges = self.info.specialranges > 0;
        let kind = match self.header.strategy {
            Strategy::Direct => StoreKind::Direct(buffer.bytes(FIELD_PAYLOAD)),
            Strategy::ByteCompressed => StoreKind::ByteCompressed(BitPacked {
                words: buffer.u64s(FIELD_PAYLOAD),
                bits: self.header.bits_per_symbol as usize,
                numofchars: self.alphabet.num_of_chars(),
            }),
            Strategy::BitAccess => StoreKind::BitAccess {
                twobit: buffer.u64s(FIELD_PAYLOAD),
                specialbits: Bits(if has_ranges {
                    buffer.u64s(FIELD_PAYLOAD + 1)
                } else {
                    &[]
                }),
            },
            Strategy::UcharTables | Strategy::UshortTables | Strategy::Uint32Tables => {
                let width = self.header.strategy.table_width().unwrap_or(TableWidth::U32);
                let (positions, lengths, endsubs) = if has_ranges {
                    let (positions, lengths) = match width {
                        TableWidth::U8 => (
                            Units::U8(buffer.bytes(FIELD_PAYLOAD + 1)),
                            Units::U8(buffer.bytes(FIELD_PAYLOAD + 2)),
                        ),
                        TableWidth::U16 => (
                            Units::U16(buffer.u16s(FIELD_PAYLOAD + 1)),
                            Units::U16(buffer.u16s(FIELD_PAYLOAD + 2)),
                        ),
                        TableWidth::U32 => (
                            Units::U32(buffer.u32s(FIELD_PAYLOAD + 1)),
                            Units::U32(buffer.u32s(FIELD_PAYLOAD + 2)),
                        ),
                    };
                    (positions, lengths, buffer.u64s(FIELD_PAYLOAD + 3))
                } else {
                    (Units::U8(&[]), Units::U8(&[]), &[][..])
                };
                StoreKind::Tables {
                    twobit: buffer.u64s(FIELD_PAYLOAD),
                    table: SpecialTable {
                        width,
                        positions,
                        lengths,
                        endsubs,
                    },
                }
            }
        };
        StoreView { total, kind }
    }

    /* Metadata */

    /// Number of symbols, separators included
    #[must_use]
    pub fn total_length(&self) -> usize {
        self.header.totallength as usize
    }

    #[must_use]
    pub fn num_of_sequences(&self) -> usize {
        self.header.numofsequences as usize
    }

    #[must_use]
    pub fn num_of_files(&self) -> usize {
        self.header.numofdbfiles as usize
    }

    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.header.strategy
    }

    #[must_use]
    pub fn header(&self) -> &EncseqHeader {
        &self.header
    }

    #[must_use]
    pub fn special_char_info(&self) -> SpecialCharInfo {
        self.info
    }

    /// Number of occurrences of each regular symbol
    #[must_use]
    pub fn character_distribution(&self) -> &[u64] {
        self.buffer.u64s(FIELD_CHARDIST)
    }

    /// Common length of all sequences, if they are equally long
    #[must_use]
    pub fn equal_length(&self) -> Option<usize> {
        self.header.equallength.map(|len| len as usize)
    }

    #[must_use]
    pub fn file_lengths(&self) -> Vec<FileLength> {
        self.buffer
            .u64s(FIELD_FILELENGTHS)
            .chunks_exact(2)
            .map(|pair| FileLength {
                length: pair[0],
                effective: pair[1],
            })
            .collect()
    }

    /// Names of the input files, in input order
    pub fn filenames(&self) -> Result<Vec<&str>> {
        self.buffer
            .bytes(FIELD_FILENAMES)
            .split(|&b| b == 0)
            .take(self.num_of_files())
            .map(|name| Ok(std::str::from_utf8(name)?))
            .collect()
    }

    /// Positions of the separators, ascending
    #[must_use]
    pub fn separator_positions(&self) -> &[u64] {
        self.buffer.u64s(FIELD_SEPPOS)
    }

    fn check_seqnum(&self, seqnum: usize) -> Result<()> {
        if seqnum >= self.num_of_sequences() {
            return Err(EncseqError::SequenceOutOfRange(seqnum, self.num_of_sequences()).into());
        }
        Ok(())
    }

    /// Forward position of the first symbol of sequence `seqnum`
    pub fn seq_start_pos(&self, seqnum: usize) -> Result<usize> {
        self.check_seqnum(seqnum)?;
        Ok(match seqnum {
            0 => 0,
            n => self.separator_positions()[n - 1] as usize + 1,
        })
    }

    pub fn seq_length(&self, seqnum: usize) -> Result<usize> {
        let start = self.seq_start_pos(seqnum)?;
        let end = self
            .separator_positions()
            .get(seqnum)
            .map_or(self.total_length(), |&sep| sep as usize);
        Ok(end - start)
    }

    /// Number of the sequence containing forward position `pos`
    ///
    /// A separator belongs to the sequence it terminates.
    #[must_use]
    pub fn seq_num(&self, pos: usize) -> usize {
        self.separator_positions()
            .partition_point(|&sep| (sep as usize) < pos)
    }

    /// Description of sequence `seqnum`, or `None` if descriptions were not stored
    pub fn description(&self, seqnum: usize) -> Result<Option<&str>> {
        self.check_seqnum(seqnum)?;
        if !self.header.descriptions {
            return Ok(None);
        }
        let ends = self.buffer.u64s(FIELD_DESCENDS);
        let start = match seqnum {
            0 => 0,
            n => ends[n - 1] as usize,
        };
        let end = ends[seqnum] as usize;
        let bytes = &self.buffer.bytes(FIELD_DESCRIPTIONS)[start..end];
        Ok(Some(std::str::from_utf8(bytes)?))
    }

    /* Symbol access */

    #[inline]
    fn raw_position(&self, pos: usize, mode: ReadMode) -> usize {
        if mode.is_reverse() {
            self.total_length() - 1 - pos
        } else {
            pos
        }
    }

    #[inline]
    fn read(&self, view: &StoreView<'_>, pos: usize, mode: ReadMode) -> u8 {
        let code = view.symbol(self.raw_position(pos, mode));
        if mode.is_complement() {
            self.alphabet.complement(code)
        } else {
            code
        }
    }

    /// Symbol code at `pos` under `mode`
    ///
    /// Complement modes leave symbols unchanged for alphabets without complement.
    ///
    /// # Panics
    ///
    /// Panics if `pos >= total_length()`.
    #[must_use]
    pub fn get(&self, pos: usize, mode: ReadMode) -> u8 {
        self.read(&self.view(), pos, mode)
    }

    /// All symbol codes under `mode`
    pub fn symbols(&self, mode: ReadMode) -> impl Iterator<Item = u8> + '_ {
        let view = self.view();
        (0..self.total_length()).map(move |pos| self.read(&view, pos, mode))
    }

    /// Printable characters of `range` under `mode`
    #[must_use]
    pub fn decode(&self, range: Range<usize>, mode: ReadMode) -> Vec<u8> {
        let view = self.view();
        let end = range.end.min(self.total_length());
        (range.start..end)
            .map(|pos| self.alphabet.decode(self.read(&view, pos, mode)))
            .collect()
    }

    /// Printable characters of sequence `seqnum`
    pub fn extract_sequence(&self, seqnum: usize) -> Result<Vec<u8>> {
        let start = self.seq_start_pos(seqnum)?;
        let length = self.seq_length(seqnum)?;
        Ok(self.decode(start..start + length, ReadMode::Forward))
    }

    /// Writes all sequences as FASTA
    ///
    /// Sequences without a stored description are named by their number. A `width` of
    /// zero writes every sequence on a single line.
    pub fn write_fasta<W: Write>(&self, writer: &mut W, width: usize) -> Result<()> {
        let mut translater = itoa::Buffer::new();
        for seqnum in 0..self.num_of_sequences() {
            writer.write_all(b">")?;
            match self.description(seqnum)? {
                Some(desc) => writer.write_all(desc.as_bytes())?,
                None => writer.write_all(translater.format(seqnum).as_bytes())?,
            }
            writer.write_all(b"\n")?;
            let sequence = self.extract_sequence(seqnum)?;
            if width == 0 {
                writer.write_all(&sequence)?;
                writer.write_all(b"\n")?;
            } else {
                for line in sequence.chunks(width) {
                    writer.write_all(line)?;
                    writer.write_all(b"\n")?;
                }
            }
        }
        Ok(())
    }

    /// Packs sequence `seqnum` two bits per nucleotide with bitnuc
    ///
    /// `buffer` is cleared first.
    ///
    /// # Errors
    ///
    /// Returns an error if the alphabet is not the nucleotide alphabet or the sequence
    /// contains wildcards.
    pub fn sequence_2bit(&self, seqnum: usize, buffer: &mut Vec<u64>) -> Result<()> {
        if !self.alphabet.has_complement() {
            return Err(EncseqError::InvalidAlphabet(
                "two-bit export requires a nucleotide alphabet".to_string(),
            )
            .into());
        }
        let sequence = self.extract_sequence(seqnum)?;
        buffer.clear();
        bitnuc::encode(&sequence, buffer)?;
        Ok(())
    }

    /* Special symbols */

    /// First special stored position at or after `pos`
    #[must_use]
    pub fn next_special(&self, pos: usize) -> Option<usize> {
        self.view().next_special(pos, self.total_length())
    }

    /// Last special stored position at or before `pos`
    #[must_use]
    pub fn prev_special(&self, pos: usize) -> Option<usize> {
        self.view().prev_special(pos.min(self.total_length().checked_sub(1)?), 0)
    }

    /// True if `start..start + len` under `mode` contains a special symbol
    #[must_use]
    pub fn has_special_in_range(&self, start: usize, len: usize, mode: ReadMode) -> bool {
        let total = self.total_length();
        let end = start.saturating_add(len).min(total);
        if start >= end {
            return false;
        }
        let (raw_start, raw_end) = if mode.is_reverse() {
            (total - end, total - start)
        } else {
            (start, end)
        };
        self.view().next_special(raw_start, raw_end).is_some()
    }

    /// Number of regular symbols the suffix at `pos` starts with, at most `limit`
    ///
    /// The end of the sequence counts as a special symbol.
    #[must_use]
    pub fn special_offset(&self, pos: usize, limit: usize, mode: ReadMode) -> usize {
        Self::offset_in(&self.view(), pos, limit, mode)
    }

    fn offset_in(view: &StoreView<'_>, pos: usize, limit: usize, mode: ReadMode) -> usize {
        let avail = view.total.saturating_sub(pos).min(limit);
        if avail == 0 {
            return 0;
        }
        if mode.is_reverse() {
            let last = view.total - 1 - pos;
            view.prev_special(last, last + 1 - avail)
                .map_or(avail, |s| last - s)
        } else {
            view.next_special(pos, pos + avail)
                .map_or(avail, |s| s - pos)
        }
    }

    /// Maximal runs of special symbols in ascending read-mode order
    #[must_use]
    pub fn special_ranges(&self, mode: ReadMode) -> SpecialRangeIterator<'_> {
        SpecialRangeIterator::new(self, mode, false)
    }

    /// Maximal runs of special symbols in descending read-mode order
    #[must_use]
    pub fn special_ranges_rev(&self, mode: ReadMode) -> SpecialRangeIterator<'_> {
        SpecialRangeIterator::new(self, mode, true)
    }

    /* Comparison */

    /// Comparison key of the symbol at `pos` under `mode`, see [`SPECIAL_KEY_BASE`]
    #[must_use]
    #[inline]
    pub fn symbol_key(&self, pos: usize, mode: ReadMode) -> u64 {
        Self::key_in(self, &self.view(), pos, mode)
    }

    #[inline]
    fn key_in(&self, view: &StoreView<'_>, pos: usize, mode: ReadMode) -> u64 {
        if pos >= view.total {
            return SPECIAL_KEY_BASE + pos as u64;
        }
        match self.read(view, pos, mode) {
            code if is_special(code) => SPECIAL_KEY_BASE + pos as u64,
            code => u64::from(code),
        }
    }

    /// The 32 symbols starting at `pos` under `mode`, packed two bits each
    ///
    /// Only meaningful for 4-symbol alphabets; `units` counts the leading regular
    /// symbols.
    #[must_use]
    pub fn extract_twobit(&self, pos: usize, mode: ReadMode) -> TwobitWindow {
        self.window_in(&self.view(), pos, mode)
    }

    fn window_in(&self, view: &StoreView<'_>, pos: usize, mode: ReadMode) -> TwobitWindow {
        let units = Self::offset_in(view, pos, UNITS_IN_TWOBIT, mode);
        if units == 0 {
            return TwobitWindow {
                tbe: 0,
                units: 0,
                position: pos,
            };
        }
        let tbe = match view.twobit() {
            Some(words) => {
                let word = if mode.is_reverse() {
                    twobit_word_before(words, view.total - 1 - pos)
                } else {
                    twobit_word_at(words, pos)
                };
                if mode.is_complement() && self.alphabet.has_complement() {
                    !word
                } else {
                    word
                }
            }
            None => (0..units).fold(0u64, |acc, i| {
                acc | (u64::from(self.read(view, pos + i, mode) & 3) << (62 - 2 * i))
            }),
        };
        TwobitWindow {
            tbe,
            units: units as u32,
            position: pos,
        }
    }

    /// Compares the suffixes at `a` and `b`, which agree on their first `depth` symbols
    ///
    /// Looks at no more than `maxdepth` symbols. Returns the order and the length of the
    /// common prefix, capped at `maxdepth`; `Equal` is only returned when the bound is
    /// reached (or `a == b`).
    #[must_use]
    pub fn compare_suffixes(
        &self,
        a: usize,
        b: usize,
        mode: ReadMode,
        depth: usize,
        maxdepth: usize,
    ) -> (Ordering, usize) {
        let view = self.view();
        let mut depth = depth;
        if self.alphabet.is_twobit() {
            while depth < maxdepth {
                let limit = (maxdepth - depth).min(UNITS_IN_TWOBIT);
                let wa = self.window_in(&view, a + depth, mode);
                let wb = self.window_in(&view, b + depth, mode);
                match compare_window_step(&wa, &wb, limit) {
                    WindowCmp::Decided(order, common) => return (order, depth + common),
                    WindowCmp::Continue => depth += UNITS_IN_TWOBIT,
                }
            }
        } else {
            while depth < maxdepth {
                let ka = self.key_in(&view, a + depth, mode);
                let kb = self.key_in(&view, b + depth, mode);
                if ka != kb {
                    return (ka.cmp(&kb), depth);
                }
                if ka >= SPECIAL_KEY_BASE {
                    return (Ordering::Equal, depth);
                }
                depth += 1;
            }
        }
        (Ordering::Equal, maxdepth)
    }
}
