//! The inference session: mutable generation state over an immutable
//! model.

use std::fmt;
use std::time::{Duration, Instant};

use gpt2_base::{LoadError, Sampler, TokenId, TokenWindow, TokenWindowError};
use rand::RngCore;
use thiserror::Error;

use crate::{Activations, Gpt2};

/// Settings for an inference session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Working sequence length; clamped to the model's maximum.
    pub seq_len: usize,
    /// Context buffer oversize ratio, in `[1.0, 3.0]`.
    pub oversize_ratio: f32,
}

/// A request to generate tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceRequest {
    /// Maximum number of tokens to generate; `None` runs until the
    /// callback halts or the process is stopped.
    pub maximum_token_count: Option<usize>,
}

/// Feedback from the per-token callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceFeedback {
    /// Keep generating.
    Continue,
    /// Stop the generation loop.
    Halt,
}

/// Errors from session construction or the generation loop.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The context window could not be constructed.
    #[error("could not create the context window")]
    ContextWindow(#[from] TokenWindowError),
    /// The activation arena could not be allocated.
    #[error("could not allocate the activation arena")]
    ActivationArena(#[from] LoadError),
    /// The user's callback reported an error.
    #[error("the user-specified callback returned an error")]
    UserCallback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Timing statistics for one [infer](InferenceSession::infer) call.
#[derive(Debug, Clone, Copy)]
pub struct InferenceStats {
    /// Wall time spent generating.
    pub predict_duration: Duration,
    /// Number of tokens generated.
    pub predict_tokens: usize,
}

impl fmt::Display for InferenceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "predict time: {}ms / {} tokens",
            self.predict_duration.as_millis(),
            self.predict_tokens,
        )
    }
}

/// Generation state for one model: the activation arena and the sliding
/// token window. Both are released together when the session is dropped.
pub struct InferenceSession {
    activations: Activations,
    window: TokenWindow,
}

impl InferenceSession {
    pub(crate) fn new(model: &Gpt2, config: SessionConfig) -> Result<Self, InferenceError> {
        let seq_len = config.seq_len.min(model.hyperparameters().n_ctx);
        Ok(Self {
            activations: Activations::new(model.hyperparameters(), seq_len)?,
            window: TokenWindow::new(seq_len, config.oversize_ratio, model.eot_token_id())?,
        })
    }

    /// The working sequence length of this session.
    pub fn seq_len(&self) -> usize {
        self.activations.seq_len()
    }

    /// The activation arena, for inspection.
    pub fn activations(&self) -> &Activations {
        &self.activations
    }

    /// Generates tokens, feeding each one to `callback`.
    ///
    /// Each step slides the context window, runs the forward pass over
    /// the effective window, draws one token from the last position's
    /// probability row (consulting the generator exactly once) and
    /// writes it back into the window.
    pub fn infer<E: std::error::Error + Send + Sync + 'static>(
        &mut self,
        model: &Gpt2,
        rng: &mut dyn RngCore,
        sampler: &dyn Sampler,
        request: &InferenceRequest,
        mut callback: impl FnMut(TokenId) -> Result<InferenceFeedback, E>,
    ) -> Result<InferenceStats, InferenceError> {
        let start = Instant::now();
        let mut predict_tokens = 0;

        while request.maximum_token_count != Some(predict_tokens) {
            let window = self.window.step();
            let t = window.len();
            model.evaluate(&mut self.activations, window);

            let probs = self
                .activations
                .probs_row(t, model.hyperparameters().n_vocab);
            let id = sampler.sample(probs, rng);
            self.window.update(id);
            predict_tokens += 1;

            match callback(id) {
                Ok(InferenceFeedback::Continue) => {}
                Ok(InferenceFeedback::Halt) => break,
                Err(err) => return Err(InferenceError::UserCallback(Box::new(err))),
            }
        }

        Ok(InferenceStats {
            predict_duration: start.elapsed(),
            predict_tokens,
        })
    }
}
