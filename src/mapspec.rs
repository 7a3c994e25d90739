//! # Typed binary layouts
//!
//! A [`Mapspec`] declares an ordered list of typed fields. The same declaration drives
//! both directions: [`Mapspec::write`] streams the field contents to a writer, and
//! [`Mapspec::read`] walks a byte buffer (usually a memory-mapped file) and yields the
//! byte range of each field.
//!
//! Fields carry no length prefixes. Every field starts on a word boundary: zero padding
//! is inserted between consecutive fields, never after the last one. A buffer is only
//! accepted if its length equals the declared payload plus that padding.
//!
//! ```
//! use encsfx::mapspec::{FieldData, FieldKind, Mapspec};
//!
//! let mut spec = Mapspec::new();
//! spec.add("flags", FieldKind::Uchar, 3).add("counts", FieldKind::U32, 1);
//!
//! let mut buffer = Vec::new();
//! spec.write(&mut buffer, &[FieldData::Uchar(&[1, 2, 3]), FieldData::U32(&[7])], 7)
//!     .unwrap();
//! assert_eq!(buffer.len(), 12);
//!
//! let fields = spec.read(&buffer, 7).unwrap();
//! assert_eq!(fields.range(1), 8..12);
//! ```

use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use memmap2::Mmap;

use crate::error::{MapspecError, Result};

/// Default alignment of every field, in bytes
pub const WORD_SIZE: usize = 8;

/// Element type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Signed 8-bit characters (file names, descriptions)
    Char,
    /// Unsigned 8-bit values
    Uchar,
    /// Unsigned 16-bit values
    U16,
    /// Unsigned 32-bit values
    U32,
    /// Unsigned 64-bit values
    U64,
    /// 64-bit words of a bitmap, most significant bit first
    Bitsequence,
    /// 64-bit words holding 32 two-bit symbols each
    Twobitencoding,
    /// 64-bit words of a fixed-width bit-packed array
    Bitelem,
}
impl FieldKind {
    /// Size of a single element in bytes
    #[must_use]
    pub fn size_of(self) -> usize {
        match self {
            Self::Char | Self::Uchar => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 | Self::Bitsequence | Self::Twobitencoding | Self::Bitelem => 8,
        }
    }
}

/// Borrowed contents of a field handed to [`Mapspec::write`]
#[derive(Debug, Clone, Copy)]
pub enum FieldData<'a> {
    Char(&'a [u8]),
    Uchar(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
    U64(&'a [u64]),
    Bitsequence(&'a [u64]),
    Twobitencoding(&'a [u64]),
    Bitelem(&'a [u64]),
}
impl FieldData<'_> {
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Char(_) => FieldKind::Char,
            Self::Uchar(_) => FieldKind::Uchar,
            Self::U16(_) => FieldKind::U16,
            Self::U32(_) => FieldKind::U32,
            Self::U64(_) => FieldKind::U64,
            Self::Bitsequence(_) => FieldKind::Bitsequence,
            Self::Twobitencoding(_) => FieldKind::Twobitencoding,
            Self::Bitelem(_) => FieldKind::Bitelem,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Char(v) | Self::Uchar(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) | Self::Bitsequence(v) | Self::Twobitencoding(v) | Self::Bitelem(v) => {
                v.len()
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::Char(v) | Self::Uchar(v) => writer.write_all(v)?,
            Self::U16(v) => {
                for &x in *v {
                    writer.write_u16::<LittleEndian>(x)?;
                }
            }
            Self::U32(v) => {
                for &x in *v {
                    writer.write_u32::<LittleEndian>(x)?;
                }
            }
            Self::U64(v) | Self::Bitsequence(v) | Self::Twobitencoding(v) | Self::Bitelem(v) => {
                for &x in *v {
                    writer.write_u64::<LittleEndian>(x)?;
                }
            }
        }
        Ok(())
    }
}

/// A single declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub count: usize,
}
impl FieldSpec {
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.kind.size_of() * self.count
    }
}

/// Number of zero bytes needed to move `offset` to the next multiple of `word_size`
#[must_use]
pub fn padding(offset: usize, word_size: usize) -> usize {
    (word_size - offset % word_size) % word_size
}

/// Writes `(word_size - offset % word_size) % word_size` zero bytes
///
/// Returns the number of bytes written.
pub fn pad<W: Write>(writer: &mut W, offset: usize, word_size: usize) -> Result<usize> {
    const ZEROS: [u8; 64] = [0; 64];
    let mut remaining = padding(offset, word_size);
    let total = remaining;
    while remaining > 0 {
        let chunk = remaining.min(ZEROS.len());
        writer.write_all(&ZEROS[..chunk])?;
        remaining -= chunk;
    }
    Ok(total)
}

/// An ordered declaration of typed fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapspec {
    fields: Vec<FieldSpec>,
    word_size: usize,
}
impl Default for Mapspec {
    fn default() -> Self {
        Self::new()
    }
}
impl Mapspec {
    /// Creates an empty declaration aligned to [`WORD_SIZE`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            word_size: WORD_SIZE,
        }
    }

    /// Creates an empty declaration with a custom alignment
    ///
    /// # Errors
    ///
    /// Returns an error if `word_size` is zero or not a power of two.
    pub fn with_word_size(word_size: usize) -> Result<Self> {
        if !word_size.is_power_of_two() {
            return Err(MapspecError::InvalidWordSize(word_size).into());
        }
        Ok(Self {
            fields: Vec::new(),
            word_size,
        })
    }

    /// Appends a field to the declaration
    pub fn add(&mut self, name: &'static str, kind: FieldKind, count: usize) -> &mut Self {
        self.fields.push(FieldSpec { name, kind, count });
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[must_use]
    pub fn word_size(&self) -> usize {
        self.word_size
    }

    /// Sum of all field sizes, without padding
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.fields.iter().map(FieldSpec::num_bytes).sum()
    }

    /// Byte ranges of all fields and the total length, padding included
    #[must_use]
    pub fn layout(&self) -> (Vec<Range<usize>>, usize) {
        let mut ranges = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                offset += padding(offset, self.word_size);
            }
            ranges.push(offset..offset + field.num_bytes());
            offset += field.num_bytes();
        }
        (ranges, offset)
    }

    /// Total number of bytes occupied by the declared fields, padding included
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.layout().1
    }

    /// Streams the given fields to `writer` in declaration order
    ///
    /// Each provided field must match its declaration in kind and element count.
    /// Zero padding is written between consecutive fields.
    ///
    /// # Arguments
    ///
    /// * `writer` - Any type that implements the `Write` trait
    /// * `data` - The field contents, one entry per declared field
    /// * `expected_size` - The number of payload bytes the caller expects
    ///
    /// # Returns
    ///
    /// The total number of bytes written, padding included
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The number, kind or count of the provided fields differs from the declaration
    /// * The payload does not sum to `expected_size`
    /// * Writing fails
    pub fn write<W: Write>(
        &self,
        writer: &mut W,
        data: &[FieldData<'_>],
        expected_size: usize,
    ) -> Result<usize> {
        if data.len() != self.fields.len() {
            return Err(MapspecError::FieldNumber(self.fields.len(), data.len()).into());
        }
        for (field, provided) in self.fields.iter().zip(data) {
            if field.kind != provided.kind() {
                return Err(MapspecError::FieldKind {
                    name: field.name,
                    declared: field.kind,
                    provided: provided.kind(),
                }
                .into());
            }
            if field.count != provided.len() {
                return Err(MapspecError::FieldCount {
                    name: field.name,
                    declared: field.count,
                    provided: provided.len(),
                }
                .into());
            }
        }
        let payload = self.payload_size();
        if payload != expected_size {
            return Err(MapspecError::SizeMismatch {
                expected: expected_size,
                got: payload,
            }
            .into());
        }

        let mut offset = 0;
        let mut total_pad = 0;
        for (idx, (field, provided)) in self.fields.iter().zip(data).enumerate() {
            if idx > 0 {
                let written = pad(writer, offset, self.word_size)?;
                offset += written;
                total_pad += written;
            }
            provided.write_to(writer)?;
            offset += field.num_bytes();
        }
        debug_assert_eq!(expected_size + total_pad, offset);
        Ok(offset)
    }

    /// Walks a buffer with the declared layout and returns each field's byte range
    ///
    /// Empty fields receive an empty range at their aligned offset.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The declared payload does not sum to `expected_size`
    /// * The buffer length differs from the declared payload plus padding
    pub fn read(&self, bytes: &[u8], expected_size: usize) -> Result<MappedFields> {
        let payload = self.payload_size();
        if payload != expected_size {
            return Err(MapspecError::SizeMismatch {
                expected: expected_size,
                got: payload,
            }
            .into());
        }
        let (ranges, total) = self.layout();
        if total != bytes.len() {
            return Err(MapspecError::LengthMismatch {
                expected: total,
                got: bytes.len(),
            }
            .into());
        }
        Ok(MappedFields { ranges })
    }
}

/// Byte ranges of the fields of a [`Mapspec`] within one buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFields {
    ranges: Vec<Range<usize>>,
}
impl MappedFields {
    #[must_use]
    pub fn range(&self, field: usize) -> Range<usize> {
        self.ranges[field].clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// A read-only memory map of a regular file
#[derive(Debug, Clone)]
pub struct MappedFile {
    mmap: Arc<Mmap>,
}
impl MappedFile {
    /// Maps the file at `path` read-only
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is not a regular file, or cannot
    /// be mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;

        // Ensure file is a regular file for memory mapping
        if !file.metadata()?.is_file() {
            return Err(MapspecError::IncompatibleFile.into());
        }

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap: Arc::new(mmap),
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}

/// Backing storage for a laid-out buffer: either owned words or a mapped file
///
/// Owned buffers are stored as `u64` words so that every word-aligned field can be
/// viewed as a typed slice.
#[derive(Debug, Clone)]
pub enum Backing {
    Owned { words: Vec<u64>, len: usize },
    Mapped(MappedFile),
}
impl Backing {
    /// Copies a byte buffer into word-aligned owned storage
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(8)];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Self::Owned {
            words,
            len: bytes.len(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Owned { words, len } => &bytemuck::cast_slice::<u64, u8>(words)[..*len],
            Self::Mapped(file) => file.as_bytes(),
        }
    }

    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

/// A buffer together with the field ranges of its layout
///
/// Typed accessors reinterpret a field's bytes in place; fields are little-endian
/// on disk and read natively.
#[derive(Debug, Clone)]
pub struct FieldBuffer {
    backing: Backing,
    fields: MappedFields,
}
impl FieldBuffer {
    /// Validates `backing` against `spec` and wraps both
    pub fn new(backing: Backing, spec: &Mapspec, expected_size: usize) -> Result<Self> {
        let fields = spec.read(backing.as_bytes(), expected_size)?;
        Ok(Self { backing, fields })
    }

    /// Serializes `data` with `spec` into an owned buffer
    pub fn from_fields(spec: &Mapspec, data: &[FieldData<'_>], expected_size: usize) -> Result<Self> {
        let mut bytes = Vec::with_capacity(spec.total_size());
        spec.write(&mut bytes, data, expected_size)?;
        Self::new(Backing::from_bytes(&bytes), spec, expected_size)
    }

    #[must_use]
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.backing.as_bytes()
    }

    #[must_use]
    pub fn bytes(&self, field: usize) -> &[u8] {
        &self.backing.as_bytes()[self.fields.range(field)]
    }

    #[must_use]
    pub fn u16s(&self, field: usize) -> &[u16] {
        bytemuck::cast_slice(self.bytes(field))
    }

    #[must_use]
    pub fn u32s(&self, field: usize) -> &[u32] {
        bytemuck::cast_slice(self.bytes(field))
    }

    #[must_use]
    pub fn u64s(&self, field: usize) -> &[u64] {
        bytemuck::cast_slice(self.bytes(field))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use std::io::Cursor;

    fn three_then_four() -> Mapspec {
        let mut spec = Mapspec::new();
        spec.add("first", FieldKind::Uchar, 3)
            .add("second", FieldKind::Uchar, 4);
        spec
    }

    #[test]
    fn test_padding_between_fields() -> Result<()> {
        let spec = three_then_four();
        let mut cursor = Cursor::new(Vec::new());
        let written = spec.write(
            &mut cursor,
            &[FieldData::Uchar(b"abc"), FieldData::Uchar(b"defg")],
            7,
        )?;
        let bytes = cursor.into_inner();

        // 5 bytes after the first field, none after the last
        assert_eq!(written, 12);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..3], b"abc");
        assert_eq!(&bytes[3..8], &[0u8; 5]);
        assert_eq!(&bytes[8..], b"defg");

        let fields = spec.read(&bytes, 7)?;
        assert_eq!(fields.range(0), 0..3);
        assert_eq!(fields.range(1), 8..12);
        Ok(())
    }

    #[test]
    fn test_pad_function() -> Result<()> {
        let mut buffer = Vec::new();
        assert_eq!(pad(&mut buffer, 3, 8)?, 5);
        assert_eq!(pad(&mut buffer, 8, 8)?, 0);
        assert_eq!(pad(&mut buffer, 13, 4)?, 3);
        assert_eq!(buffer, vec![0u8; 8]);
        Ok(())
    }

    #[test]
    fn test_size_mismatch_on_write() {
        let spec = three_then_four();
        let mut buffer = Vec::new();
        let result = spec.write(
            &mut buffer,
            &[FieldData::Uchar(b"abc"), FieldData::Uchar(b"defg")],
            8,
        );
        assert!(matches!(
            result,
            Err(crate::Error::MapspecError(MapspecError::SizeMismatch {
                expected: 8,
                got: 7
            }))
        ));
    }

    #[test]
    fn test_kind_and_count_mismatch() {
        let spec = three_then_four();
        let mut buffer = Vec::new();
        let result = spec.write(
            &mut buffer,
            &[FieldData::Uchar(b"abc"), FieldData::U32(&[1])],
            7,
        );
        assert!(matches!(
            result,
            Err(crate::Error::MapspecError(MapspecError::FieldKind { .. }))
        ));

        let result = spec.write(
            &mut buffer,
            &[FieldData::Uchar(b"ab"), FieldData::Uchar(b"defg")],
            7,
        );
        assert!(matches!(
            result,
            Err(crate::Error::MapspecError(MapspecError::FieldCount { .. }))
        ));

        let result = spec.write(&mut buffer, &[FieldData::Uchar(b"abc")], 7);
        assert!(matches!(
            result,
            Err(crate::Error::MapspecError(MapspecError::FieldNumber(2, 1)))
        ));
    }

    #[test]
    fn test_truncated_buffer_rejected() -> Result<()> {
        let spec = three_then_four();
        let mut bytes = Vec::new();
        spec.write(
            &mut bytes,
            &[FieldData::Uchar(b"abc"), FieldData::Uchar(b"defg")],
            7,
        )?;
        assert!(spec.read(&bytes[..11], 7).is_err());
        bytes.push(0);
        assert!(spec.read(&bytes, 7).is_err());
        Ok(())
    }

    #[test]
    fn test_empty_fields_and_typed_views() -> Result<()> {
        let mut spec = Mapspec::new();
        spec.add("name", FieldKind::Char, 5)
            .add("nothing", FieldKind::U64, 0)
            .add("shorts", FieldKind::U16, 3)
            .add("words", FieldKind::Twobitencoding, 2);
        let expected = 5 + 6 + 16;
        let buffer = FieldBuffer::from_fields(
            &spec,
            &[
                FieldData::Char(b"hello"),
                FieldData::U64(&[]),
                FieldData::U16(&[1, 2, 65535]),
                FieldData::Twobitencoding(&[u64::MAX, 42]),
            ],
            expected,
        )?;
        assert_eq!(buffer.bytes(0), b"hello");
        assert!(buffer.u64s(1).is_empty());
        assert_eq!(buffer.u16s(2), &[1, 2, 65535]);
        assert_eq!(buffer.u64s(3), &[u64::MAX, 42]);
        assert_eq!(buffer.as_bytes().len(), spec.total_size());
        Ok(())
    }

    #[test]
    fn test_custom_word_size() -> Result<()> {
        let mut spec = Mapspec::with_word_size(4)?;
        spec.add("a", FieldKind::Uchar, 1).add("b", FieldKind::U32, 1);
        let (ranges, total) = spec.layout();
        assert_eq!(ranges, vec![0..1, 4..8]);
        assert_eq!(total, 8);
        assert!(Mapspec::with_word_size(6).is_err());
        Ok(())
    }

    #[test]
    fn test_mapped_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fields.bin");
        let mut spec = Mapspec::new();
        spec.add("values", FieldKind::U32, 3);
        let mut file = std::fs::File::create(&path)?;
        spec.write(&mut file, &[FieldData::U32(&[3, 1, 4])], 12)?;
        drop(file);

        let mapped = MappedFile::open(&path)?;
        let buffer = FieldBuffer::new(Backing::Mapped(mapped), &spec, 12)?;
        assert!(buffer.backing().is_mapped());
        assert_eq!(buffer.u32s(0), &[3, 1, 4]);

        assert!(MappedFile::open(dir.path()).is_err());
        Ok(())
    }
}
