//! Symbol alphabets
//!
//! An [`Alphabet`] maps input bytes to dense symbol codes `0..numofchars`. Bytes that
//! denote an unknown residue map to [`WILDCARD`]; [`SEPARATOR`] is reserved for the
//! boundary between two sequences. Both are "special" symbols: they are stored out of
//! band by the two-bit strategies and never match anything during suffix comparison.

use crate::error::{EncseqError, Result};

/// Code of a wildcard symbol (e.g. `N` in DNA, `X` in protein)
pub const WILDCARD: u8 = 254;

/// Code of the separator between two sequences
pub const SEPARATOR: u8 = 255;

/// Code reported by the BWT stream for the suffix starting at position 0
pub const UNDEFBWTCHAR: u8 = 253;

/// Printable form of a separator
pub const SEPARATOR_CHAR: u8 = b'$';

const UNDEFINED: u8 = 252;

/// Largest number of regular symbols an alphabet may hold
pub const MAX_ALPHABET_SIZE: usize = UNDEFINED as usize;

/// Returns true if `code` is a wildcard or a separator
#[must_use]
#[inline]
pub fn is_special(code: u8) -> bool {
    code >= WILDCARD
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbolmap: [u8; 256],
    characters: Vec<u8>,
    wildcard_show: u8,
    complement: bool,
}
impl Alphabet {
    /// Builds an alphabet from groups of equivalent characters
    ///
    /// Each group becomes one symbol code, in order; the first character of a group is
    /// its printable form. Characters are matched case-insensitively. Every character in
    /// `wildcards` maps to [`WILDCARD`] and the first one is its printable form.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no groups, more than [`MAX_ALPHABET_SIZE`] groups,
    /// an empty group, or a character that appears twice.
    pub fn new(groups: &[&[u8]], wildcards: &[u8]) -> Result<Self> {
        if groups.is_empty() || groups.len() > MAX_ALPHABET_SIZE {
            return Err(EncseqError::InvalidAlphabet(format!(
                "alphabet must have between 1 and {MAX_ALPHABET_SIZE} symbols, got {}",
                groups.len()
            ))
            .into());
        }
        let mut symbolmap = [UNDEFINED; 256];
        let mut characters = Vec::with_capacity(groups.len());
        let mut assign = |byte: u8, code: u8| -> Result<()> {
            for b in [byte.to_ascii_uppercase(), byte.to_ascii_lowercase()] {
                match symbolmap[b as usize] {
                    UNDEFINED => symbolmap[b as usize] = code,
                    existing if existing == code => {}
                    _ => {
                        return Err(EncseqError::InvalidAlphabet(format!(
                            "character '{}' is assigned twice",
                            b as char
                        ))
                        .into())
                    }
                }
            }
            Ok(())
        };
        for (code, group) in groups.iter().enumerate() {
            let Some(&show) = group.first() else {
                return Err(EncseqError::InvalidAlphabet(format!("symbol {code} is empty")).into());
            };
            for &byte in *group {
                assign(byte, code as u8)?;
            }
            characters.push(show);
        }
        for &byte in wildcards {
            assign(byte, WILDCARD)?;
        }
        Ok(Self {
            symbolmap,
            characters,
            wildcard_show: wildcards.first().copied().unwrap_or(b'N'),
            complement: false,
        })
    }

    /// The nucleotide alphabet `ACGT` (with `U` folded onto `T`) and IUPAC wildcards
    #[must_use]
    pub fn dna() -> Self {
        let groups: [&[u8]; 4] = [b"A", b"C", b"G", b"TU"];
        let mut alphabet = match Self::new(&groups, b"NSYWRKVBDHM") {
            Ok(alphabet) => alphabet,
            Err(_) => unreachable!("the nucleotide alphabet is well-formed"),
        };
        alphabet.complement = true;
        alphabet
    }

    /// The 20 standard amino acids with `X`, `B`, `Z`, `U`, `O`, `J` and `*` as wildcards
    #[must_use]
    pub fn protein() -> Self {
        let groups: Vec<&[u8]> = b"LVIFKREDAGSTNQYWPHMC"
            .chunks(1)
            .collect();
        match Self::new(&groups, b"XBZUOJ*") {
            Ok(alphabet) => alphabet,
            Err(_) => unreachable!("the protein alphabet is well-formed"),
        }
    }

    /// Restores an alphabet from its persisted parts
    pub(crate) fn from_parts(
        symbolmap: &[u8],
        characters: &[u8],
        wildcard_show: u8,
        complement: bool,
    ) -> Result<Self> {
        let Ok(symbolmap) = <[u8; 256]>::try_from(symbolmap) else {
            return Err(EncseqError::InvalidAlphabet(format!(
                "symbol map has {} entries",
                symbolmap.len()
            ))
            .into());
        };
        if characters.is_empty() || characters.len() > MAX_ALPHABET_SIZE {
            return Err(EncseqError::InvalidAlphabet(format!(
                "alphabet has {} symbols",
                characters.len()
            ))
            .into());
        }
        Ok(Self {
            symbolmap,
            characters: characters.to_vec(),
            wildcard_show,
            complement: complement && characters.len() == 4,
        })
    }

    /// Number of regular (non-special) symbols
    #[must_use]
    pub fn num_of_chars(&self) -> usize {
        self.characters.len()
    }

    /// True for 4-symbol alphabets, which can use two-bit encodings
    #[must_use]
    pub fn is_twobit(&self) -> bool {
        self.characters.len() == 4
    }

    /// True if symbols can be complemented (nucleotide alphabets)
    #[must_use]
    pub fn has_complement(&self) -> bool {
        self.complement
    }

    /// Encodes a byte; `None` if the byte is not part of the alphabet
    #[must_use]
    #[inline]
    pub fn encode(&self, byte: u8) -> Option<u8> {
        match self.symbolmap[byte as usize] {
            UNDEFINED => None,
            code => Some(code),
        }
    }

    /// Printable form of a symbol code
    #[must_use]
    #[inline]
    pub fn decode(&self, code: u8) -> u8 {
        match code {
            WILDCARD => self.wildcard_show,
            SEPARATOR => SEPARATOR_CHAR,
            UNDEFBWTCHAR => b'~',
            c => self.characters.get(c as usize).copied().unwrap_or(b'?'),
        }
    }

    /// Complement of a symbol code; special codes and alphabets without complement are
    /// returned unchanged
    #[must_use]
    #[inline]
    pub fn complement(&self, code: u8) -> u8 {
        if self.complement && !is_special(code) {
            3 - code
        } else {
            code
        }
    }

    /// Bits needed to store every symbol plus the wildcard and separator escapes
    #[must_use]
    pub fn bits_per_symbol(&self) -> u32 {
        let maxvalue = self.characters.len() + 1;
        usize::BITS - maxvalue.leading_zeros()
    }

    pub(crate) fn symbolmap(&self) -> &[u8; 256] {
        &self.symbolmap
    }

    pub(crate) fn characters(&self) -> &[u8] {
        &self.characters
    }

    pub(crate) fn wildcard_show(&self) -> u8 {
        self.wildcard_show
    }
}
