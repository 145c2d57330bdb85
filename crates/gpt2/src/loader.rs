//! Reading a checkpoint into the parameter arena.

use std::io::Read;
use std::path::Path;

use gpt2_base::{loader::open_file, util, LoadError, TensorArena};
use thiserror::Error;

use crate::{Gpt2, Hyperparameters, Parameter};

/// File magic of the model checkpoint format.
pub const MODEL_MAGIC: u32 = 20240326;
/// Supported model format version.
pub const MODEL_VERSION: u32 = 1;

/// Progress reported while loading a model.
#[derive(Debug, Clone, Copy)]
pub enum LoadProgress {
    /// The header was parsed and validated.
    HyperparametersLoaded,
    /// The parameter arena was allocated.
    ArenaAllocated {
        /// Size of the arena in bytes.
        bytes: usize,
    },
    /// All parameter data was read.
    Loaded {
        /// Total number of parameter elements.
        parameter_count: usize,
    },
}

/// Errors from serializing hyperparameters.
#[derive(Debug, Error)]
pub enum HyperparametersWriteError {
    /// A non-specific I/O error.
    #[error("non-specific I/O error")]
    Io(#[from] std::io::Error),
    /// A field did not fit the header's integer type.
    #[error("invalid integer conversion")]
    InvalidIntegerConversion(#[from] std::num::TryFromIntError),
}

impl Hyperparameters {
    /// Reads the architecture fields from a parsed 256-int header.
    pub fn read(header: &[i32; util::HEADER_INTS]) -> Result<Self, LoadError> {
        Ok(Self {
            n_ctx: usize::try_from(header[2])?,
            n_vocab: usize::try_from(header[3])?,
            n_layer: usize::try_from(header[4])?,
            n_head: usize::try_from(header[5])?,
            n_embd: usize::try_from(header[6])?,
        })
    }

    /// Writes a complete 1024-byte header for these hyperparameters.
    pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<(), HyperparametersWriteError> {
        let mut header = [0i32; util::HEADER_INTS];
        header[0] = MODEL_MAGIC as i32;
        header[1] = MODEL_VERSION as i32;
        header[2] = i32::try_from(self.n_ctx)?;
        header[3] = i32::try_from(self.n_vocab)?;
        header[4] = i32::try_from(self.n_layer)?;
        header[5] = i32::try_from(self.n_head)?;
        header[6] = i32::try_from(self.n_embd)?;
        for value in header {
            util::write_i32(writer, value)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), LoadError> {
        let invariant = if self.n_vocab == 0 {
            "the vocabulary must not be empty"
        } else if self.n_ctx == 0 {
            "the maximum sequence length must be positive"
        } else if self.n_layer == 0 {
            "the model must have at least one layer"
        } else if self.n_head == 0 {
            "the model must have at least one attention head"
        } else if self.n_embd == 0 || self.n_embd % self.n_head != 0 {
            "the channel count must be a positive multiple of the head count"
        } else {
            return Ok(());
        };
        Err(LoadError::InvariantBroken {
            invariant: invariant.to_string(),
        })
    }
}

impl Gpt2 {
    /// Loads a model from a checkpoint file.
    ///
    /// Parses and validates the 1024-byte header, allocates the
    /// parameter arena and reads the flat float data into it in one
    /// contiguous read. Progress is reported through the callback; on
    /// any failure the partially built arena is released.
    pub fn load(
        path: &Path,
        mut load_progress_callback: impl FnMut(LoadProgress),
    ) -> Result<Self, LoadError> {
        let mut reader = open_file(path)?;

        let header = util::read_header(&mut reader)?;
        let magic = header[0] as u32;
        if magic != MODEL_MAGIC {
            return Err(LoadError::InvalidMagic {
                path: path.to_owned(),
                magic,
            });
        }
        let version = header[1] as u32;
        if version != MODEL_VERSION {
            return Err(LoadError::InvalidFormatVersion { version });
        }

        let hyperparameters = Hyperparameters::read(&header)?;
        hyperparameters.validate()?;
        load_progress_callback(LoadProgress::HyperparametersLoaded);

        let sizes = Parameter::element_counts(&hyperparameters);
        let mut params = TensorArena::new(&sizes)?;
        load_progress_callback(LoadProgress::ArenaAllocated {
            bytes: params.byte_count(),
        });

        let expected = params.byte_count();
        reader.read_exact(params.as_bytes_mut()).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                LoadError::TruncatedParameterData { expected }
            } else {
                LoadError::Io(err)
            }
        })?;
        load_progress_callback(LoadProgress::Loaded {
            parameter_count: params.element_count(),
        });

        Ok(Self {
            hyperparameters,
            params,
        })
    }
}
