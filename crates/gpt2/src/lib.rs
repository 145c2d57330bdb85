//! A CPU-only inference engine for GPT-2 checkpoints.
//! Ref: [The Illustrated GPT-2](https://jalammar.github.io/illustrated-gpt2/)
//!
//! A checkpoint is a flat file of hyperparameters and float tensors; the
//! engine loads it into a single aligned parameter arena, runs the
//! forward pass over a sliding context window and samples one token per
//! step from the last position's probability row.
//!
//! # Example
//!
//! ```no_run
//! use rand::SeedableRng;
//!
//! let model = gpt2::Gpt2::load(std::path::Path::new("gpt2_124M.bin"), |_| {})
//!     .unwrap_or_else(|err| panic!("Failed to load model: {err}"));
//!
//! let mut session = model
//!     .start_session(gpt2::SessionConfig {
//!         seq_len: model.hyperparameters().n_ctx,
//!         oversize_ratio: 2.0,
//!     })
//!     .unwrap();
//!
//! let mut rng = gpt2::XorShiftRng::seed_from_u64(1337);
//! session
//!     .infer::<std::convert::Infallible>(
//!         &model,
//!         &mut rng,
//!         &gpt2::Multinomial,
//!         &gpt2::InferenceRequest {
//!             maximum_token_count: Some(16),
//!         },
//!         |id| {
//!             print!("{id} ");
//!             Ok(gpt2::InferenceFeedback::Continue)
//!         },
//!     )
//!     .unwrap();
//! ```
#![deny(missing_docs)]

use gpt2_base::kernels;

mod activations;
mod loader;
mod session;
mod weights;

pub use activations::{Activation, Activations};
pub use loader::{HyperparametersWriteError, LoadProgress, MODEL_MAGIC, MODEL_VERSION};
pub use session::{
    InferenceError, InferenceFeedback, InferenceRequest, InferenceSession, InferenceStats,
    SessionConfig,
};
pub use weights::Parameter;

pub use gpt2_base::{
    LoadError, Multinomial, Sampler, TensorArena, TokenId, TokenWindow, TokenWindowError,
    Vocabulary, XorShiftRng,
};

/// End-of-text sentinel id in the standard 50257-token GPT-2 vocabulary.
pub const EOT_TOKEN_ID: TokenId = 50256;

/// GPT-2 [hyperparameters](https://en.wikipedia.org/wiki/Hyperparameter_(machine_learning)),
/// read from the checkpoint header.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct Hyperparameters {
    /// Size of the model's vocabulary.
    pub n_vocab: usize,
    /// Maximum sequence length the weights were trained for.
    pub n_ctx: usize,
    /// Size of the model's embedding layer.
    pub n_embd: usize,
    /// Number of attention heads.
    pub n_head: usize,
    /// Number of transformer blocks.
    pub n_layer: usize,
}

impl Hyperparameters {
    /// Dimension of one attention head's query/key/value vector.
    pub fn head_size(&self) -> usize {
        self.n_embd / self.n_head
    }
}

/// The GPT-2 model: hyperparameters plus the parameter arena.
///
/// Immutable after loading; all mutable inference state lives in the
/// [InferenceSession]. The parameter arena is released when the model is
/// dropped.
pub struct Gpt2 {
    hyperparameters: Hyperparameters,
    params: TensorArena,
}

impl Gpt2 {
    /// The hyperparameters the model was loaded with.
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// The tensor holding a given parameter.
    pub fn parameter(&self, parameter: Parameter) -> &[f32] {
        self.params.tensor(parameter.index())
    }

    /// The end-of-text sentinel id: the last vocabulary entry, which is
    /// [EOT_TOKEN_ID] for standard GPT-2 checkpoints.
    pub fn eot_token_id(&self) -> TokenId {
        (self.hyperparameters.n_vocab - 1) as TokenId
    }

    /// Starts an inference session, allocating its activation arena and
    /// context window.
    pub fn start_session(&self, config: SessionConfig) -> Result<InferenceSession, InferenceError> {
        InferenceSession::new(self, config)
    }

    /// Runs the forward pass over `tokens`, filling the activation
    /// arena up to the effective sequence length `tokens.len()`.
    ///
    /// Token ids must lie in `[0, n_vocab)` and `tokens` must be no
    /// longer than the sequence length the activations were sized for;
    /// the session upholds both.
    pub fn evaluate(&self, activations: &mut Activations, tokens: &[TokenId]) {
        let Hyperparameters {
            n_vocab,
            n_embd,
            n_head,
            n_layer,
            ..
        } = self.hyperparameters;
        let t = tokens.len();
        debug_assert!(t >= 1 && t <= activations.seq_len());

        let c = n_embd;
        let tc = t * c;
        let att_len = n_head * t * t;

        let acts = activations.split_mut();

        kernels::encoder_forward(
            &mut acts.encoded[..tc],
            tokens,
            self.parameter(Parameter::Wte),
            self.parameter(Parameter::Wpe),
            c,
        );

        for l in 0..n_layer {
            let (res3_prev, res3_cur) = acts.residual3.split_at_mut(l * tc);
            let residual: &[f32] = if l == 0 {
                &acts.encoded[..tc]
            } else {
                &res3_prev[(l - 1) * tc..][..tc]
            };

            let l_ln1 = &mut acts.ln1[l * tc..][..tc];
            let l_ln1_mean = &mut acts.ln1_mean[l * t..][..t];
            let l_ln1_rstd = &mut acts.ln1_rstd[l * t..][..t];
            let l_qkv = &mut acts.qkv[l * 3 * tc..][..3 * tc];
            let l_atty = &mut acts.atty[l * tc..][..tc];
            let l_preatt = &mut acts.preatt[l * att_len..][..att_len];
            let l_att = &mut acts.att[l * att_len..][..att_len];
            let l_attproj = &mut acts.attproj[l * tc..][..tc];
            let l_residual2 = &mut acts.residual2[l * tc..][..tc];
            let l_ln2 = &mut acts.ln2[l * tc..][..tc];
            let l_ln2_mean = &mut acts.ln2_mean[l * t..][..t];
            let l_ln2_rstd = &mut acts.ln2_rstd[l * t..][..t];
            let l_fch = &mut acts.fch[l * 4 * tc..][..4 * tc];
            let l_fch_gelu = &mut acts.fch_gelu[l * 4 * tc..][..4 * tc];
            let l_fcproj = &mut acts.fcproj[l * tc..][..tc];

            let ln1w = &self.parameter(Parameter::Ln1Weight)[l * c..][..c];
            let ln1b = &self.parameter(Parameter::Ln1Bias)[l * c..][..c];
            let qkvw = &self.parameter(Parameter::QkvWeight)[l * 3 * c * c..][..3 * c * c];
            let qkvb = &self.parameter(Parameter::QkvBias)[l * 3 * c..][..3 * c];
            let attprojw = &self.parameter(Parameter::AttnProjWeight)[l * c * c..][..c * c];
            let attprojb = &self.parameter(Parameter::AttnProjBias)[l * c..][..c];
            let ln2w = &self.parameter(Parameter::Ln2Weight)[l * c..][..c];
            let ln2b = &self.parameter(Parameter::Ln2Bias)[l * c..][..c];
            let fcw = &self.parameter(Parameter::FcWeight)[l * 4 * c * c..][..4 * c * c];
            let fcb = &self.parameter(Parameter::FcBias)[l * 4 * c..][..4 * c];
            let fcprojw = &self.parameter(Parameter::FcProjWeight)[l * 4 * c * c..][..4 * c * c];
            let fcprojb = &self.parameter(Parameter::FcProjBias)[l * c..][..c];

            kernels::layernorm_forward(l_ln1, l_ln1_mean, l_ln1_rstd, residual, ln1w, ln1b, c);
            kernels::matmul_forward(l_qkv, l_ln1, qkvw, qkvb, c, 3 * c);
            kernels::attention_forward(l_atty, l_preatt, l_att, l_qkv, t, c, n_head);
            kernels::matmul_forward(l_attproj, l_atty, attprojw, attprojb, c, c);
            kernels::residual_forward(l_residual2, residual, l_attproj);
            kernels::layernorm_forward(l_ln2, l_ln2_mean, l_ln2_rstd, l_residual2, ln2w, ln2b, c);
            kernels::matmul_forward(l_fch, l_ln2, fcw, fcb, c, 4 * c);
            kernels::gelu_forward(l_fch_gelu, l_fch);
            kernels::matmul_forward(l_fcproj, l_fch_gelu, fcprojw, fcprojb, 4 * c, c);
            kernels::residual_forward(&mut res3_cur[..tc], l_residual2, l_fcproj);
        }

        let residual = &acts.residual3[(n_layer - 1) * tc..][..tc];
        kernels::layernorm_forward(
            &mut acts.lnf[..tc],
            &mut acts.lnf_mean[..t],
            &mut acts.lnf_rstd[..t],
            residual,
            self.parameter(Parameter::LnfWeight),
            self.parameter(Parameter::LnfBias),
            c,
        );

        // Unembedding reuses the token embedding matrix as [n_vocab, n_embd].
        kernels::matmul_forward_nobias(
            &mut acts.logits[..t * n_vocab],
            &acts.lnf[..tc],
            self.parameter(Parameter::Wte),
            c,
            n_vocab,
        );
        kernels::softmax_forward(
            &mut acts.probs[..t * n_vocab],
            &acts.logits[..t * n_vocab],
            n_vocab,
        );
    }
}
