use rand::Rng;

use crate::{alphabet::Alphabet, alphabet::WILDCARD, error::EncseqError, Result};

/// Seed for the random draws of [`Policy::RandomDraw`]
pub const RNG_SEED: u64 = 42;

/// Policy for handling characters that are not part of the alphabet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Fail with the offending character and its position
    #[default]
    BreakOnInvalid,
    /// Drop the whole sequence
    IgnoreSequence,
    /// Drop the offending character
    SkipCharacter,
    /// Store the offending character as a wildcard
    MapToWildcard,
    /// Replace the offending character by a random regular symbol
    RandomDraw,
}
impl Policy {
    /// Encode a sequence into symbol codes according to the policy
    ///
    /// First clears the output buffer to ensure that it is empty.
    ///
    /// Returns a boolean indicating whether the sequence should be stored.
    /// Returns an error if encoding should be broken on invalid characters.
    ///
    /// # Arguments
    /// * `sequence` - The raw characters
    /// * `alphabet` - The alphabet to encode with
    /// * `offset` - Position of the first character in the concatenated input, for errors
    /// * `ibuf` - The buffer receiving the symbol codes
    /// * `rng` - The random number generator
    pub fn handle<R: Rng>(
        &self,
        sequence: &[u8],
        alphabet: &Alphabet,
        offset: usize,
        ibuf: &mut Vec<u8>,
        rng: &mut R,
    ) -> Result<bool> {
        ibuf.clear();
        ibuf.reserve(sequence.len());
        let numofchars = alphabet.num_of_chars();
        for (idx, &byte) in sequence.iter().enumerate() {
            if let Some(code) = alphabet.encode(byte) {
                ibuf.push(code);
                continue;
            }
            match self {
                Self::BreakOnInvalid => {
                    return Err(EncseqError::InvalidCharacter {
                        character: byte as char,
                        position: offset + idx,
                    }
                    .into())
                }
                Self::IgnoreSequence => {
                    ibuf.clear();
                    return Ok(false);
                }
                Self::SkipCharacter => {}
                Self::MapToWildcard => ibuf.push(WILDCARD),
                Self::RandomDraw => ibuf.push(rng.random_range(0..numofchars) as u8),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_policies() -> Result<()> {
        let dna = Alphabet::dna();
        let mut rng = SmallRng::seed_from_u64(RNG_SEED);
        let mut ibuf = Vec::new();

        assert!(Policy::BreakOnInvalid
            .handle(b"AC1T", &dna, 10, &mut ibuf, &mut rng)
            .is_err());

        assert!(!Policy::IgnoreSequence.handle(b"AC1T", &dna, 0, &mut ibuf, &mut rng)?);
        assert!(ibuf.is_empty());

        assert!(Policy::SkipCharacter.handle(b"AC1T", &dna, 0, &mut ibuf, &mut rng)?);
        assert_eq!(ibuf, vec![0, 1, 3]);

        assert!(Policy::MapToWildcard.handle(b"AC1T", &dna, 0, &mut ibuf, &mut rng)?);
        assert_eq!(ibuf, vec![0, 1, WILDCARD, 3]);

        assert!(Policy::RandomDraw.handle(b"AC1TN", &dna, 0, &mut ibuf, &mut rng)?);
        assert_eq!(ibuf.len(), 5);
        assert!(ibuf[2] < 4);
        assert_eq!(ibuf[4], WILDCARD);
        Ok(())
    }

    #[test]
    fn test_error_position() {
        let dna = Alphabet::dna();
        let mut rng = SmallRng::seed_from_u64(RNG_SEED);
        let mut ibuf = Vec::new();
        let err = Policy::default()
            .handle(b"ACG#", &dna, 100, &mut ibuf, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::EncseqError(EncseqError::InvalidCharacter {
                character: '#',
                position: 103
            })
        ));
    }
}
