use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::Path;

use rand::{rngs::SmallRng, SeedableRng};
use seq_io::fasta::Record;

use super::header::{EncseqHeader, FileLength, SpecialCharInfo};
use super::store::{bitpack, bitmap_words, strategy_size, Strategy, TableParts, TableWidth};
use super::twobit::{twobit_store, units_of_twobit};
use super::EncodedSequence;
use crate::alphabet::{is_special, Alphabet, SEPARATOR, WILDCARD};
use crate::error::{EncseqError, Result};
use crate::mapspec::FieldData;
use crate::policy::{Policy, RNG_SEED};

/// Accumulates sequences and encodes them into an [`EncodedSequence`]
///
/// Sequences are concatenated in the order they are added, with a single separator
/// between two consecutive sequences. Characters outside the alphabet are handled by
/// the configured [`Policy`].
///
/// # Examples
///
/// ```
/// use encsfx::{Alphabet, EncseqBuilder, ReadMode};
///
/// let mut builder = EncseqBuilder::new(Alphabet::dna());
/// builder.add_sequence(b"first", b"ACGTN").unwrap();
/// builder.add_sequence(b"second", b"GGA").unwrap();
/// let encseq = builder.build().unwrap();
///
/// assert_eq!(encseq.total_length(), 9);
/// assert_eq!(encseq.decode(0..9, ReadMode::Forward), b"ACGTN$GGA");
/// ```
pub struct EncseqBuilder {
    alphabet: Alphabet,

    /// Forced storage strategy; `None` picks the smallest
    strategy: Option<Strategy>,

    /// Policy for handling characters outside the alphabet
    policy: Policy,

    /// Whether to keep sequence descriptions
    descriptions: bool,

    /// Random number generator for the `RandomDraw` policy
    /// Seeded with `RNG_SEED` for reproducibility
    rng: SmallRng,

    /// Encoded symbols of the current sequence
    ibuf: Vec<u8>,

    /// Encoded symbols of everything added so far
    symbols: Vec<u8>,
    separators: Vec<u64>,

    /// NUL-terminated file names
    filenames: Vec<u8>,
    files: Vec<FileLength>,
    sequences_in_file: usize,

    descbytes: Vec<u8>,
    descends: Vec<u64>,

    numofsequences: usize,
    first_length: Option<usize>,
    equal_lengths: bool,
}
impl EncseqBuilder {
    #[must_use]
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            alphabet,
            strategy: None,
            policy: Policy::default(),
            descriptions: false,
            rng: SmallRng::seed_from_u64(RNG_SEED),
            ibuf: Vec::default(),
            symbols: Vec::default(),
            separators: Vec::default(),
            filenames: Vec::default(),
            files: Vec::default(),
            sequences_in_file: 0,
            descbytes: Vec::default(),
            descends: Vec::default(),
            numofsequences: 0,
            first_length: None,
            equal_lengths: true,
        }
    }

    /// Forces a storage strategy instead of picking the smallest one
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep the description of every sequence
    #[must_use]
    pub fn descriptions(mut self, descriptions: bool) -> Self {
        self.descriptions = descriptions;
        self
    }

    /// Starts a new input file; following sequences are accounted to it
    pub fn start_file(&mut self, name: &str) {
        self.filenames.extend_from_slice(name.as_bytes());
        self.filenames.push(0);
        self.files.push(FileLength::default());
        self.sequences_in_file = 0;
    }

    /// Adds one sequence
    ///
    /// If no file was started, the sequence is accounted to a file named `-`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence holds a character outside the alphabet and the
    /// policy is [`Policy::BreakOnInvalid`]. Nothing is added in that case.
    pub fn add_sequence(&mut self, description: &[u8], sequence: &[u8]) -> Result<()> {
        if self.files.is_empty() {
            self.start_file("-");
        }
        let offset = self.symbols.len() + usize::from(self.numofsequences > 0);
        if !self
            .policy
            .handle(sequence, &self.alphabet, offset, &mut self.ibuf, &mut self.rng)?
        {
            return Ok(());
        }

        if self.numofsequences > 0 {
            self.separators.push(self.symbols.len() as u64);
            self.symbols.push(SEPARATOR);
        }
        let effective = self.ibuf.iter().filter(|&&c| !is_special(c)).count();
        if let Some(file) = self.files.last_mut() {
            if self.sequences_in_file > 0 {
                file.length += 1;
            }
            file.length += self.ibuf.len() as u64;
            file.effective += effective as u64;
        }
        self.symbols.extend_from_slice(&self.ibuf);

        match self.first_length {
            None => self.first_length = Some(self.ibuf.len()),
            Some(len) if len != self.ibuf.len() => self.equal_lengths = false,
            Some(_) => {}
        }
        if self.descriptions {
            self.descbytes.extend_from_slice(description);
            self.descends.push(self.descbytes.len() as u64);
        }
        self.sequences_in_file += 1;
        self.numofsequences += 1;
        Ok(())
    }

    /// Adds every record of a (possibly compressed) FASTA stream as a new file
    ///
    /// # Returns
    ///
    /// The number of records read
    pub fn add_fasta_reader<R: Read + Send + 'static>(&mut self, name: &str, reader: R) -> Result<usize> {
        let (reader, _format) = niffler::get_reader(Box::new(reader)).map_err(anyhow::Error::from)?;
        let mut reader = seq_io::fasta::Reader::new(reader);
        self.start_file(name);
        let mut count = 0;
        while let Some(record) = reader.next() {
            let record = record.map_err(anyhow::Error::from)?;
            let sequence = record.full_seq();
            self.add_sequence(record.head(), &sequence)?;
            count += 1;
        }
        Ok(count)
    }

    /// Adds every record of a (possibly compressed) FASTA file
    pub fn add_fasta_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path).map(BufReader::new)?;
        let count = self.add_fasta_reader(&path.to_string_lossy(), file)?;
        log::debug!("read {} sequences from {}", count, path.display());
        Ok(count)
    }

    /// Encodes everything added so far
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was added or a two-bit strategy was forced for an
    /// alphabet that does not have four symbols.
    pub fn build(self) -> Result<EncodedSequence> {
        if self.symbols.is_empty() {
            return Err(EncseqError::EmptyInput.into());
        }
        let total = self.symbols.len();
        let numofchars = self.alphabet.num_of_chars();
        let bits = self.alphabet.bits_per_symbol() as usize;

        let scan = SymbolScan::new(&self.symbols, numofchars);
        let ranges_for = |strategy: Strategy| {
            strategy.table_width().map_or(scan.runs.len(), |width| {
                scan.runs.iter().map(|run| width.entries_for_run(run)).sum()
            })
        };
        let size_of = |strategy: Strategy| strategy_size(strategy, total, ranges_for(strategy), bits);

        let strategy = match self.strategy {
            Some(strategy) => {
                if strategy.is_twobit() && !self.alphabet.is_twobit() {
                    return Err(EncseqError::IncompatibleStrategy {
                        strategy: strategy.name(),
                        numofchars,
                    }
                    .into());
                }
                strategy
            }
            None => {
                let candidates: &[Strategy] = if self.alphabet.is_twobit() {
                    &[
                        Strategy::BitAccess,
                        Strategy::UcharTables,
                        Strategy::UshortTables,
                        Strategy::Uint32Tables,
                    ]
                } else {
                    &[Strategy::Direct, Strategy::ByteCompressed]
                };
                candidates
                    .iter()
                    .copied()
                    .min_by_key(|&s| size_of(s))
                    .unwrap_or(Strategy::Direct)
            }
        };
        let size = size_of(strategy);
        log::info!(
            "init character encoding ({}, {} bytes, {:.2} bits/symbol)",
            strategy,
            size,
            (8 * size) as f64 / total as f64
        );

        let info = SpecialCharInfo {
            specialranges: ranges_for(strategy) as u64,
            ..scan.info
        };

        let mut header = EncseqHeader::new(strategy);
        header.numofchars = numofchars as u8;
        header.complement = self.alphabet.has_complement();
        header.descriptions = self.descriptions;
        header.totallength = total as u64;
        header.numofsequences = self.numofsequences as u64;
        header.numofdbfiles = self.files.len() as u64;
        header.lengthofdbfilenames = self.filenames.len() as u64;
        header.descriptionlength = self.descbytes.len() as u64;
        header.equallength = self
            .first_length
            .filter(|_| self.equal_lengths)
            .map(|len| len as u64);
        header.wildcard_show = self.alphabet.wildcard_show();
        header.bits_per_symbol = bits as u8;

        let payload = Payload::encode(strategy, &self.symbols, &scan.runs, numofchars, bits);
        let filelengths: Vec<u64> = self
            .files
            .iter()
            .flat_map(|file| [file.length, file.effective])
            .collect();

        let mut data = vec![
            FieldData::Uchar(self.alphabet.symbolmap()),
            FieldData::Uchar(self.alphabet.characters()),
            FieldData::Char(&self.filenames),
            FieldData::U64(&filelengths),
            FieldData::U64(&scan.chardist),
            FieldData::U64(&self.separators),
            FieldData::Char(&self.descbytes),
            FieldData::U64(&self.descends),
        ];
        payload.fields(&mut data);
        EncodedSequence::from_parts(header, info, self.alphabet.clone(), &data)
    }
}

/// Statistics gathered in one pass over the symbols
struct SymbolScan {
    /// Maximal runs of special symbols
    runs: Vec<Range<usize>>,
    chardist: Vec<u64>,
    /// Everything but `specialranges`, which depends on the strategy
    info: SpecialCharInfo,
}
impl SymbolScan {
    fn new(symbols: &[u8], numofchars: usize) -> Self {
        let mut runs: Vec<Range<usize>> = Vec::new();
        let mut chardist = vec![0u64; numofchars];
        let mut wildcards = 0;
        let mut wildcardranges = 0;
        let mut previous = 0u8;
        for (pos, &code) in symbols.iter().enumerate() {
            if is_special(code) {
                match runs.last_mut() {
                    Some(run) if run.end == pos => run.end = pos + 1,
                    _ => runs.push(pos..pos + 1),
                }
                if code == WILDCARD {
                    wildcards += 1;
                    if previous != WILDCARD {
                        wildcardranges += 1;
                    }
                }
            } else {
                chardist[code as usize] += 1;
            }
            previous = code;
        }
        let prefix = |pred: fn(&u8) -> bool| symbols.iter().take_while(|c| pred(c)).count() as u64;
        let suffix =
            |pred: fn(&u8) -> bool| symbols.iter().rev().take_while(|c| pred(c)).count() as u64;
        let info = SpecialCharInfo {
            specialcharacters: runs.iter().map(|run| run.len() as u64).sum(),
            specialranges: 0,
            realspecialranges: runs.len() as u64,
            lengthofspecialprefix: prefix(|&c| is_special(c)),
            lengthofspecialsuffix: suffix(|&c| is_special(c)),
            wildcards,
            wildcardranges,
            lengthofwildcardprefix: prefix(|&c| c == WILDCARD),
            lengthofwildcardsuffix: suffix(|&c| c == WILDCARD),
        };
        Self {
            runs,
            chardist,
            info,
        }
    }
}

/// Strategy-specific payload before serialization
enum Payload {
    Direct(Vec<u8>),
    ByteCompressed(Vec<u64>),
    BitAccess {
        twobit: Vec<u64>,
        specialbits: Option<Vec<u64>>,
    },
    Tables {
        twobit: Vec<u64>,
        width: TableWidth,
        parts: TableParts,
        narrow8: (Vec<u8>, Vec<u8>),
        narrow16: (Vec<u16>, Vec<u16>),
    },
}
impl Payload {
    fn encode(
        strategy: Strategy,
        symbols: &[u8],
        runs: &[Range<usize>],
        numofchars: usize,
        bits: usize,
    ) -> Self {
        let total = symbols.len();
        match strategy {
            Strategy::Direct => Self::Direct(symbols.to_vec()),
            Strategy::ByteCompressed => Self::ByteCompressed(bitpack(symbols, bits, numofchars)),
            Strategy::BitAccess => {
                let specialbits = (!runs.is_empty()).then(|| {
                    let mut words = vec![0u64; bitmap_words(total)];
                    for pos in runs.iter().flat_map(Clone::clone) {
                        words[pos / 64] |= (1u64 << 63) >> (pos % 64);
                    }
                    words
                });
                Self::BitAccess {
                    twobit: Self::twobit(symbols),
                    specialbits,
                }
            }
            Strategy::UcharTables | Strategy::UshortTables | Strategy::Uint32Tables => {
                let width = strategy.table_width().unwrap_or(TableWidth::U32);
                let parts = if runs.is_empty() {
                    TableParts::default()
                } else {
                    TableParts::from_runs(width, runs, total)
                };
                let (narrow8, narrow16) = match width {
                    TableWidth::U8 => (
                        (
                            TableParts::narrow_u8(&parts.positions),
                            TableParts::narrow_u8(&parts.lengths),
                        ),
                        Default::default(),
                    ),
                    TableWidth::U16 => (
                        Default::default(),
                        (
                            TableParts::narrow_u16(&parts.positions),
                            TableParts::narrow_u16(&parts.lengths),
                        ),
                    ),
                    TableWidth::U32 => Default::default(),
                };
                Self::Tables {
                    twobit: Self::twobit(symbols),
                    width,
                    parts,
                    narrow8,
                    narrow16,
                }
            }
        }
    }

    /// Packs the symbols two bits each; wildcards store 0, separators 1
    fn twobit(symbols: &[u8]) -> Vec<u64> {
        let mut words = vec![0u64; units_of_twobit(symbols.len())];
        for (pos, &code) in symbols.iter().enumerate() {
            let stored = match code {
                WILDCARD => 0,
                SEPARATOR => 1,
                c => c,
            };
            twobit_store(&mut words, pos, stored);
        }
        words
    }

    fn fields<'a>(&'a self, data: &mut Vec<FieldData<'a>>) {
        match self {
            Self::Direct(bytes) => data.push(FieldData::Uchar(bytes)),
            Self::ByteCompressed(words) => data.push(FieldData::Bitelem(words)),
            Self::BitAccess {
                twobit,
                specialbits,
            } => {
                data.push(FieldData::Twobitencoding(twobit));
                if let Some(words) = specialbits {
                    data.push(FieldData::Bitsequence(words));
                }
            }
            Self::Tables {
                twobit,
                width,
                parts,
                narrow8,
                narrow16,
            } => {
                data.push(FieldData::Twobitencoding(twobit));
                if parts.positions.is_empty() {
                    return;
                }
                match width {
                    TableWidth::U8 => {
                        data.push(FieldData::Uchar(&narrow8.0));
                        data.push(FieldData::Uchar(&narrow8.1));
                    }
                    TableWidth::U16 => {
                        data.push(FieldData::U16(&narrow16.0));
                        data.push(FieldData::U16(&narrow16.1));
                    }
                    TableWidth::U32 => {
                        data.push(FieldData::U32(&parts.positions));
                        data.push(FieldData::U32(&parts.lengths));
                    }
                }
                data.push(FieldData::U64(&parts.endsubs));
            }
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_symbol_scan() {
        let dna = Alphabet::dna();
        let symbols: Vec<u8> = b"NNAC$GTN$NAN"
            .iter()
            .map(|&b| if b == b'$' { SEPARATOR } else { dna.encode(b).unwrap_or(0) })
            .collect();
        let scan = SymbolScan::new(&symbols, 4);
        assert_eq!(scan.runs, vec![0..2, 4..5, 7..10, 11..12]);
        assert_eq!(scan.chardist, vec![2, 1, 1, 1]);
        assert_eq!(scan.info.wildcardranges, 4);
        assert_eq!(scan.info.lengthofspecialprefix, 2);
    }

    #[test]
    fn test_file_accounting() -> Result<()> {
        let mut builder = EncseqBuilder::new(Alphabet::dna());
        builder.add_sequence(b"", b"ACG")?;
        builder.add_sequence(b"", b"TT")?;
        let encseq = builder.build()?;
        assert_eq!(encseq.filenames()?, vec!["-"]);
        assert_eq!(encseq.file_lengths()[0].length, 6);
        assert_eq!(encseq.file_lengths()[0].effective, 5);
        Ok(())
    }

    #[test]
    fn test_table_entries_for_long_runs() -> Result<()> {
        let mut sequence = b"ACGT".repeat(100);
        sequence.splice(200..200, std::iter::repeat_n(b'N', 600));
        let mut builder = EncseqBuilder::new(Alphabet::dna()).strategy(Strategy::UcharTables);
        builder.add_sequence(b"", &sequence)?;
        let encseq = builder.build()?;
        let info = encseq.special_char_info();
        // 200..800 touches pages 0, 1, 2 and 3
        assert_eq!(info.realspecialranges, 1);
        assert_eq!(info.specialranges, 4);
        assert_eq!(encseq.decode(0..1000, crate::encseq::ReadMode::Forward), sequence);
        Ok(())
    }

    #[test]
    fn test_ignore_sequence_policy() -> Result<()> {
        let mut builder = EncseqBuilder::new(Alphabet::dna()).policy(Policy::IgnoreSequence);
        builder.add_sequence(b"", b"ACGT")?;
        builder.add_sequence(b"", b"AC#T")?;
        builder.add_sequence(b"", b"GG")?;
        let encseq = builder.build()?;
        assert_eq!(encseq.num_of_sequences(), 2);
        assert_eq!(encseq.total_length(), 7);
        Ok(())
    }
}
