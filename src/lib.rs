//! # encsfx
//!
//! Compact storage of large biological sequence collections and suffix sorting with
//! LCP values over them.
//!
//! * [`EncodedSequence`] stores the concatenated input in one of several
//!   [`Strategy`] layouts, with special symbols (wildcards and separators) kept out of
//!   band so that 4-symbol alphabets pack two bits per symbol.
//! * [`Bcktab`] groups suffixes into buckets by their first symbols.
//! * [`Suffixer`] sorts each bucket with a [blind trie](sort::BlindTrie), a
//!   [radix sort](sort::RadixSortString) or a [packed-key sort](sort::ShortReadSort)
//!   and yields a [`SuffixArray`].
//!
//! All three persist through [`mapspec`] layouts and can be memory-mapped back.
//!
//! ```
//! use encsfx::{Alphabet, EncseqBuilder, ReadMode, Suffixer, SuffixerConfig};
//!
//! let mut builder = EncseqBuilder::new(Alphabet::dna());
//! builder.add_sequence(b"first", b"ACGTNACGT").unwrap();
//! builder.add_sequence(b"second", b"ACGT").unwrap();
//! let encseq = builder.build().unwrap();
//!
//! let config = SuffixerConfig::new().prefixlength(2).readmode(ReadMode::Forward);
//! let array = Suffixer::new(&encseq, config).unwrap().sort().unwrap();
//! assert_eq!(array.len(), encseq.total_length() + 1);
//! ```

pub mod alphabet;
pub mod bcktab;
pub mod encseq;
mod error;
pub mod mapspec;
mod policy;
pub mod sort;
pub mod suffixer;

pub use alphabet::Alphabet;
pub use bcktab::{Bcktab, BucketBoundaries};
pub use encseq::{EncodedSequence, EncseqBuilder, ReadMode, SpecialRange, Strategy};
pub use error::{BcktabError, EncseqError, Error, MapspecError, Result, SortError};
pub use policy::{Policy, RNG_SEED};
pub use sort::{BucketSort, UnsortedRangeHandler};
pub use suffixer::{PageReader, Stream, SuffixArray, Suffixer, SuffixerConfig};

#[cfg(test)]
mod testing {

    use super::*;
    use anyhow::Result;
    use std::io::Cursor;

    const FASTA: &[u8] = b">seq1 first\nACGTTGCANNACGT\nACGGT\n>seq2\nTTGCAACG\n>seq3 third\nACGTRACG\n";

    #[test]
    fn test_fasta_to_suffix_array() -> Result<()> {
        let mut builder = EncseqBuilder::new(Alphabet::dna())
            .policy(Policy::MapToWildcard)
            .descriptions(true);
        builder.add_fasta_reader("reads.fa", Cursor::new(FASTA.to_vec()))?;
        let encseq = builder.build()?;
        assert_eq!(encseq.num_of_sequences(), 3);
        assert_eq!(encseq.description(0)?, Some("seq1 first"));

        let dir = tempfile::tempdir()?;
        let indexname = dir.path().join("reads");
        encseq.flush(&indexname)?;
        let mapped = EncodedSequence::map(&indexname)?;
        assert!(mapped.is_mapped());
        assert_eq!(
            mapped.decode(0..mapped.total_length(), ReadMode::Forward),
            encseq.decode(0..encseq.total_length(), ReadMode::Forward)
        );

        let config = SuffixerConfig::new().prefixlength(2);
        let array = Suffixer::new(&mapped, config)?.sort()?;
        let from_owned = Suffixer::new(&encseq, config)?.sort()?;
        assert_eq!(array, from_owned);

        // every adjacent pair is in order
        for pair in array.suftab().windows(2) {
            let (order, _) = mapped.compare_suffixes(
                pair[0],
                pair[1],
                ReadMode::Forward,
                0,
                usize::MAX,
            );
            assert_eq!(order, std::cmp::Ordering::Less);
        }

        array.flush(&indexname)?;
        assert_eq!(SuffixArray::load(&indexname)?, array);
        Ok(())
    }

    #[test]
    fn test_strategies_sort_alike() -> Result<()> {
        let mut arrays = Vec::new();
        for strategy in Strategy::ALL {
            let mut builder = EncseqBuilder::new(Alphabet::dna()).strategy(strategy);
            builder.add_sequence(b"", b"NNACGTACGTTTACNNNGGA")?;
            builder.add_sequence(b"", b"ACGTACGTACGTACGTAAAN")?;
            let encseq = builder.build()?;
            let config = SuffixerConfig::new().prefixlength(3);
            arrays.push(Suffixer::new(&encseq, config)?.sort()?);
        }
        assert!(arrays.windows(2).all(|w| w[0] == w[1]));
        Ok(())
    }
}
