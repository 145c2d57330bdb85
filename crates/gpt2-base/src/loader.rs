//! The load-error taxonomy shared by the model and vocabulary readers.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Errors encountered while loading a model or vocabulary file.
///
/// All validation happens at load time; the compute kernels and the
/// sampler assume well-formed arenas and never fail.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A file failed to open.
    #[error("could not open file {path:?}")]
    OpenFileFailed {
        /// The original error.
        source: std::io::Error,
        /// The path that failed.
        path: PathBuf,
    },
    /// A non-specific I/O error.
    #[error("non-specific I/O error")]
    Io(#[from] std::io::Error),
    /// The magic number in the header did not match the expected value.
    #[error("invalid magic number {magic} for {path:?}")]
    InvalidMagic {
        /// The path that failed.
        path: PathBuf,
        /// The magic number that was read.
        magic: u32,
    },
    /// The file format version is unsupported.
    #[error("invalid file format version {version}")]
    InvalidFormatVersion {
        /// The version that was read.
        version: u32,
    },
    /// A header field could not be converted to a usable value.
    #[error("invalid integer conversion")]
    InvalidIntegerConversion(#[from] std::num::TryFromIntError),
    /// An invariant of the format was not upheld by the file.
    #[error("invariant broken: {invariant}")]
    InvariantBroken {
        /// The invariant that was broken.
        invariant: String,
    },
    /// The parameter block ended before the declared tensor data was read.
    #[error("parameter data truncated: expected {expected} bytes")]
    TruncatedParameterData {
        /// Expected size of the parameter block in bytes.
        expected: usize,
    },
    /// The vocabulary ended before the length byte of a record.
    #[error("vocabulary truncated at record {index}")]
    TruncatedVocabulary {
        /// Index of the truncated record.
        index: usize,
    },
    /// A vocabulary record ended before its declared byte string.
    #[error("token bytes truncated at record {index}")]
    TruncatedToken {
        /// Index of the truncated record.
        index: usize,
    },
    /// A vocabulary record declared a word longer than its slot.
    #[error("record {index} declares a {size} byte word, more than the {max} byte maximum")]
    WordSizeTooLarge {
        /// Index of the offending record.
        index: usize,
        /// The declared size.
        size: usize,
        /// The largest supported size.
        max: usize,
    },
    /// The allocator could not provide an arena of the required size.
    #[error("could not allocate an arena of {bytes} bytes")]
    OutOfMemory {
        /// The requested size in bytes.
        bytes: usize,
    },
}

/// Opens a file for buffered reading, mapping the failure to
/// [LoadError::OpenFileFailed].
pub fn open_file(path: &Path) -> Result<BufReader<File>, LoadError> {
    Ok(BufReader::new(File::open(path).map_err(|source| {
        LoadError::OpenFileFailed {
            source,
            path: path.to_owned(),
        }
    })?))
}
