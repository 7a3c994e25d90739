//! Fixed-size header of a persisted encoded sequence
//!
//! The header is the first field of the layout. It records everything needed to
//! declare the remaining fields, so a reader can rebuild the full layout from the first
//! [`SIZE_HEADER`] + [`SIZE_SPECIALCHARINFO`] bytes of a file.

use byteorder::{ByteOrder, LittleEndian};

use super::store::Strategy;
use crate::error::{EncseqError, Result};

/// Current magic number: "ESQ1" in ASCII (in little-endian byte order)
#[allow(clippy::unreadable_literal)]
const MAGIC: u32 = 0x31515345;

/// Current format version of the encoded sequence layout
const FORMAT: u8 = 1;

/// Size of the header in bytes
pub const SIZE_HEADER: usize = 64;

/// Size of the serialized [`SpecialCharInfo`] in bytes
pub const SIZE_SPECIALCHARINFO: usize = 8 * SpecialCharInfo::NUM_WORDS;

/// Reserved bytes in the header
pub const RESERVED: [u8; 6] = [42; 6];

const FLAG_COMPLEMENT: u8 = 1;
const FLAG_DESCRIPTIONS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncseqHeader {
    /// Magic number to identify the file format
    pub magic: u32,
    /// Version of the file format
    pub format: u8,
    /// Storage strategy of the payload
    pub strategy: Strategy,
    /// Number of regular symbols of the alphabet
    pub numofchars: u8,
    /// Whether the alphabet has a complement
    pub complement: bool,
    /// Whether per-sequence descriptions are stored
    pub descriptions: bool,
    /// Number of symbols, separators included
    pub totallength: u64,
    pub numofsequences: u64,
    pub numofdbfiles: u64,
    /// Length of the NUL-terminated file name list
    pub lengthofdbfilenames: u64,
    /// Length of the concatenated description bytes
    pub descriptionlength: u64,
    /// Common length of all sequences, if they are equally long
    pub equallength: Option<u64>,
    /// Printable form of the wildcard
    pub wildcard_show: u8,
    /// Width of a bit-packed symbol
    pub bits_per_symbol: u8,
    pub reserved: [u8; 6],
}
impl EncseqHeader {
    /// Parses a header from the beginning of a buffer
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The buffer is smaller than `SIZE_HEADER`
    /// * The magic number is incorrect
    /// * The format version or strategy tag is unsupported
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIZE_HEADER {
            return Err(EncseqError::InvalidSize(buffer.len(), SIZE_HEADER).into());
        }
        let magic = LittleEndian::read_u32(&buffer[0..4]);
        if magic != MAGIC {
            return Err(EncseqError::InvalidMagicNumber(magic).into());
        }
        let format = buffer[4];
        if format != FORMAT {
            return Err(EncseqError::InvalidFormatVersion(format).into());
        }
        let Some(strategy) = Strategy::from_tag(buffer[5]) else {
            return Err(EncseqError::InvalidStrategy(buffer[5]).into());
        };
        let flags = buffer[7];
        let equallength = match LittleEndian::read_u64(&buffer[48..56]) {
            u64::MAX => None,
            len => Some(len),
        };
        let mut reserved = [0u8; 6];
        reserved.copy_from_slice(&buffer[58..64]);
        Ok(Self {
            magic,
            format,
            strategy,
            numofchars: buffer[6],
            complement: flags & FLAG_COMPLEMENT != 0,
            descriptions: flags & FLAG_DESCRIPTIONS != 0,
            totallength: LittleEndian::read_u64(&buffer[8..16]),
            numofsequences: LittleEndian::read_u64(&buffer[16..24]),
            numofdbfiles: LittleEndian::read_u64(&buffer[24..32]),
            lengthofdbfilenames: LittleEndian::read_u64(&buffer[32..40]),
            descriptionlength: LittleEndian::read_u64(&buffer[40..48]),
            equallength,
            wildcard_show: buffer[56],
            bits_per_symbol: buffer[57],
            reserved,
        })
    }

    /// Serializes the header into its fixed-size form
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIZE_HEADER] {
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], self.magic);
        buffer[4] = self.format;
        buffer[5] = self.strategy.tag();
        buffer[6] = self.numofchars;
        let mut flags = 0;
        if self.complement {
            flags |= FLAG_COMPLEMENT;
        }
        if self.descriptions {
            flags |= FLAG_DESCRIPTIONS;
        }
        buffer[7] = flags;
        LittleEndian::write_u64(&mut buffer[8..16], self.totallength);
        LittleEndian::write_u64(&mut buffer[16..24], self.numofsequences);
        LittleEndian::write_u64(&mut buffer[24..32], self.numofdbfiles);
        LittleEndian::write_u64(&mut buffer[32..40], self.lengthofdbfilenames);
        LittleEndian::write_u64(&mut buffer[40..48], self.descriptionlength);
        LittleEndian::write_u64(&mut buffer[48..56], self.equallength.unwrap_or(u64::MAX));
        buffer[56] = self.wildcard_show;
        buffer[57] = self.bits_per_symbol;
        buffer[58..64].copy_from_slice(&self.reserved);
        buffer
    }

    pub(crate) fn new(strategy: Strategy) -> Self {
        Self {
            magic: MAGIC,
            format: FORMAT,
            strategy,
            numofchars: 0,
            complement: false,
            descriptions: false,
            totallength: 0,
            numofsequences: 0,
            numofdbfiles: 0,
            lengthofdbfilenames: 0,
            descriptionlength: 0,
            equallength: None,
            wildcard_show: b'N',
            bits_per_symbol: 0,
            reserved: RESERVED,
        }
    }
}

/// Summary of the special symbols of an encoded sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecialCharInfo {
    /// Number of special symbols (wildcards and separators)
    pub specialcharacters: u64,
    /// Number of special-range entries of the chosen strategy
    pub specialranges: u64,
    /// Number of maximal runs of special symbols
    pub realspecialranges: u64,
    pub lengthofspecialprefix: u64,
    pub lengthofspecialsuffix: u64,
    pub wildcards: u64,
    /// Number of maximal runs of wildcards
    pub wildcardranges: u64,
    pub lengthofwildcardprefix: u64,
    pub lengthofwildcardsuffix: u64,
}
impl SpecialCharInfo {
    pub const NUM_WORDS: usize = 9;

    #[must_use]
    pub fn to_words(&self) -> [u64; Self::NUM_WORDS] {
        [
            self.specialcharacters,
            self.specialranges,
            self.realspecialranges,
            self.lengthofspecialprefix,
            self.lengthofspecialsuffix,
            self.wildcards,
            self.wildcardranges,
            self.lengthofwildcardprefix,
            self.lengthofwildcardsuffix,
        ]
    }

    /// Parses the little-endian serialized form
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is smaller than `SIZE_SPECIALCHARINFO`.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIZE_SPECIALCHARINFO {
            return Err(EncseqError::InvalidSize(buffer.len(), SIZE_SPECIALCHARINFO).into());
        }
        let word = |idx: usize| LittleEndian::read_u64(&buffer[8 * idx..8 * idx + 8]);
        Ok(Self {
            specialcharacters: word(0),
            specialranges: word(1),
            realspecialranges: word(2),
            lengthofspecialprefix: word(3),
            lengthofspecialsuffix: word(4),
            wildcards: word(5),
            wildcardranges: word(6),
            lengthofwildcardprefix: word(7),
            lengthofwildcardsuffix: word(8),
        })
    }
}

/// Length and number of regular symbols of one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileLength {
    /// Number of positions covered by the file, inner separators included
    pub length: u64,
    /// Number of regular symbols
    pub effective: u64,
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_header_roundtrip() -> Result<()> {
        let mut header = EncseqHeader::new(Strategy::UshortTables);
        header.numofchars = 4;
        header.complement = true;
        header.totallength = 1234;
        header.numofsequences = 7;
        header.numofdbfiles = 2;
        header.lengthofdbfilenames = 12;
        header.descriptionlength = 99;
        header.equallength = Some(176);
        header.bits_per_symbol = 3;
        let bytes = header.to_bytes();
        assert_eq!(EncseqHeader::from_buffer(&bytes)?, header);
        Ok(())
    }

    #[test]
    fn test_header_validation() {
        let header = EncseqHeader::new(Strategy::Direct);
        let mut bytes = header.to_bytes();
        assert!(EncseqHeader::from_buffer(&bytes[..10]).is_err());
        bytes[5] = 0;
        assert!(matches!(
            EncseqHeader::from_buffer(&bytes),
            Err(crate::Error::EncseqError(EncseqError::InvalidStrategy(0)))
        ));
        bytes[0] = 0;
        assert!(matches!(
            EncseqHeader::from_buffer(&bytes),
            Err(crate::Error::EncseqError(
                EncseqError::InvalidMagicNumber(_)
            ))
        ));
    }

    #[test]
    fn test_specialcharinfo_words() -> Result<()> {
        let info = SpecialCharInfo {
            specialcharacters: 5,
            specialranges: 3,
            realspecialranges: 2,
            lengthofspecialprefix: 1,
            lengthofspecialsuffix: 0,
            wildcards: 4,
            wildcardranges: 2,
            lengthofwildcardprefix: 1,
            lengthofwildcardsuffix: 0,
        };
        let mut bytes = Vec::new();
        for word in info.to_words() {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        assert_eq!(SpecialCharInfo::from_buffer(&bytes)?, info);
        Ok(())
    }
}
