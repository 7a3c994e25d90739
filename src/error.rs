/// Custom Result type for encsfx operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the encsfx library, encompassing all possible error cases
/// that can occur while encoding sequences, persisting layouts and sorting suffixes.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to typed binary layouts and mapped files
    MapspecError(#[from] MapspecError),
    /// Errors that occur while building, mapping or querying an encoded sequence
    EncseqError(#[from] EncseqError),
    /// Errors related to the prefix-code bucket table
    BcktabError(#[from] BcktabError),
    /// Errors raised by the suffix sorters and the sorting driver
    SortError(#[from] SortError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Errors from the bitnuc nucleotide processing library
    BitnucError(#[from] bitnuc::NucleotideError),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors specific to declaring, writing and reading typed binary layouts
#[derive(thiserror::Error, Debug)]
pub enum MapspecError {
    /// The payload does not have the size the caller expected
    ///
    /// # Arguments
    /// * `expected` - The expected number of payload bytes
    /// * `got` - The number of payload bytes actually found
    #[error("expected file size is {expected} bytes, but file has {got} bytes")]
    SizeMismatch { expected: usize, got: usize },

    /// The buffer is not exactly as long as the declared fields plus padding
    ///
    /// # Arguments
    /// * `expected` - The length implied by the declaration
    /// * `got` - The length of the buffer
    #[error("mapped region has {got} bytes, but the declared layout requires {expected} bytes")]
    LengthMismatch { expected: usize, got: usize },

    /// A provided field does not have the kind its declaration names
    #[error("field {name} is declared as {declared:?} but was provided as {provided:?}")]
    FieldKind {
        name: &'static str,
        declared: crate::mapspec::FieldKind,
        provided: crate::mapspec::FieldKind,
    },

    /// A provided field does not have the element count its declaration names
    #[error("field {name} is declared with {declared} elements but {provided} were provided")]
    FieldCount {
        name: &'static str,
        declared: usize,
        provided: usize,
    },

    /// The number of provided fields differs from the number of declared fields
    ///
    /// # Arguments
    /// * First `usize` - The number of declared fields
    /// * Second `usize` - The number of provided fields
    #[error("{0} fields are declared but {1} were provided")]
    FieldNumber(usize, usize),

    /// The word size is zero or not a power of two
    #[error("Invalid word size: {0}")]
    InvalidWordSize(usize),

    /// The file being mapped is not a regular file (e.g., it might be a directory)
    #[error("File is not regular")]
    IncompatibleFile,
}

/// Errors that can occur while building, mapping or querying an encoded sequence
#[derive(thiserror::Error, Debug)]
pub enum EncseqError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    ///
    /// # Arguments
    /// * `u8` - The unsupported version number that was found
    #[error("Invalid format version: {0}")]
    InvalidFormatVersion(u8),

    /// The header names a storage strategy this library does not know
    #[error("Invalid storage strategy tag: {0}")]
    InvalidStrategy(u8),

    /// The buffer is too small to hold a header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The number of bytes required
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),

    /// A two-bit strategy was requested for an alphabet that is not of size four
    #[error("storage strategy {strategy} requires a 4-symbol alphabet, alphabet has {numofchars}")]
    IncompatibleStrategy {
        strategy: &'static str,
        numofchars: usize,
    },

    /// A complement read mode was requested for an alphabet without complement
    #[error("read mode {0} requires a nucleotide alphabet")]
    NoComplement(&'static str),

    /// A character outside the alphabet was found
    #[error("illegal character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    /// The alphabet definition is not usable
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),

    /// No symbols were added before building
    #[error("cannot build an encoded sequence from empty input")]
    EmptyInput,

    /// Attempted to access a sequence number beyond the available range
    ///
    /// # Arguments
    /// * First `usize` - The requested sequence number
    /// * Second `usize` - The number of sequences
    #[error("Requested sequence number ({0}) is out of sequence range ({1})")]
    SequenceOutOfRange(usize, usize),
}

/// Errors related to the prefix-code bucket table
#[derive(thiserror::Error, Debug)]
pub enum BcktabError {
    /// The number of codes does not fit into the code-bit budget
    #[error("prefix length {prefixlength} over {numofchars} symbols overflows the code width")]
    CodeOverflow {
        numofchars: usize,
        prefixlength: usize,
    },

    /// The prefix length must be at least 1
    #[error("Invalid prefix length: {0}")]
    InvalidPrefixLength(usize),

    /// The magic number in a bucket table file does not match
    #[error("Invalid magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The format version in a bucket table file is not supported
    #[error("Invalid format version: {0}")]
    InvalidFormatVersion(u8),

    /// The buffer is too small to hold a header
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),

    /// The table was built over a different alphabet or sequence than the one given
    #[error("bucket table covers {got} suffixes, expected {expected}")]
    IncompatibleSequence { expected: usize, got: usize },
}

/// Errors raised by the suffix sorters and the sorting driver
#[derive(thiserror::Error, Debug)]
pub enum SortError {
    /// The requested bucket sorter needs two-bit windows, which the alphabet lacks
    #[error("{0} sorting requires a 4-symbol alphabet")]
    RequiresTwobit(&'static str),

    /// The depth bound is smaller than the prefix length
    #[error("maximal sort depth {maxdepth} is smaller than the prefix length {prefixlength}")]
    MaxDepthTooSmall {
        maxdepth: usize,
        prefixlength: usize,
    },

    /// The magic number in a suffix table file does not match
    #[error("Invalid magic number: {0}")]
    InvalidMagicNumber(u32),

    /// The format version in a suffix table file is not supported
    #[error("Invalid format version: {0}")]
    InvalidFormatVersion(u8),

    /// The buffer is too small to hold a header
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),

    /// A suffix table file names a read mode this library does not know
    #[error("Invalid read mode tag: {0}")]
    InvalidReadMode(u8),

    /// A sorting worker thread panicked
    #[error("sorting worker {0} panicked")]
    WorkerPanic(usize),
}
