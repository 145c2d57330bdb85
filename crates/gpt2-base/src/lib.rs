//! This crate provides the common structure used by the `gpt2` inference
//! crate: the aligned tensor arena, the forward-pass compute kernels, the
//! sliding token window, the sampling machinery and the decoder
//! vocabulary reader. Not intended for use by end-users.
#![deny(missing_docs)]

pub mod context;
pub mod kernels;
pub mod loader;
pub mod sampler;
pub mod tensor;
pub mod util;
pub mod vocabulary;

pub use context::{TokenWindow, TokenWindowError};
pub use loader::LoadError;
pub use sampler::{Multinomial, Sampler, XorShiftRng};
pub use tensor::TensorArena;
pub use vocabulary::Vocabulary;

/// A token identifier produced or consumed by a model.
pub type TokenId = u32;
