//! The activation tensor table and arena.

use gpt2_base::{LoadError, TensorArena};

use crate::Hyperparameters;

/// Roles of the twenty-three activation tensors, in arena order.
///
/// Sizes are computed for batch one and a working sequence length `t`
/// chosen at session start; a forward pass over a shorter window uses a
/// densely packed prefix of each tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Summed token and position embeddings, `[t, n_embd]`.
    Encoded,
    /// First layer-norm output, `[n_layer, t, n_embd]`.
    Ln1,
    /// First layer-norm means, `[n_layer, t]`.
    Ln1Mean,
    /// First layer-norm reciprocal standard deviations, `[n_layer, t]`.
    Ln1Rstd,
    /// Fused query/key/value rows, `[n_layer, t, 3·n_embd]`.
    Qkv,
    /// Attention head outputs, `[n_layer, t, n_embd]`.
    Atty,
    /// Raw attention scores, `[n_layer, n_head, t, t]`.
    Preatt,
    /// Normalized attention weights, `[n_layer, n_head, t, t]`.
    Att,
    /// Attention output projection, `[n_layer, t, n_embd]`.
    AttProj,
    /// Residual stream after attention, `[n_layer, t, n_embd]`.
    Residual2,
    /// Second layer-norm output, `[n_layer, t, n_embd]`.
    Ln2,
    /// Second layer-norm means, `[n_layer, t]`.
    Ln2Mean,
    /// Second layer-norm reciprocal standard deviations, `[n_layer, t]`.
    Ln2Rstd,
    /// Feed-forward expansion, `[n_layer, t, 4·n_embd]`.
    Fch,
    /// Feed-forward expansion after GELU, `[n_layer, t, 4·n_embd]`.
    FchGelu,
    /// Feed-forward projection, `[n_layer, t, n_embd]`.
    FcProj,
    /// Residual stream after the feed-forward block, `[n_layer, t, n_embd]`.
    Residual3,
    /// Final layer-norm output, `[t, n_embd]`.
    Lnf,
    /// Final layer-norm means, `[t]`.
    LnfMean,
    /// Final layer-norm reciprocal standard deviations, `[t]`.
    LnfRstd,
    /// Unembedding output, `[t, n_vocab]`.
    Logits,
    /// Softmax of the logits, `[t, n_vocab]`.
    Probs,
    /// Reserved per-position losses, `[t]`. Kept in the layout for
    /// compatibility with training-era tooling; never written.
    Losses,
}

impl Activation {
    /// All activation tensors in arena order.
    pub const ALL: [Self; 23] = [
        Self::Encoded,
        Self::Ln1,
        Self::Ln1Mean,
        Self::Ln1Rstd,
        Self::Qkv,
        Self::Atty,
        Self::Preatt,
        Self::Att,
        Self::AttProj,
        Self::Residual2,
        Self::Ln2,
        Self::Ln2Mean,
        Self::Ln2Rstd,
        Self::Fch,
        Self::FchGelu,
        Self::FcProj,
        Self::Residual3,
        Self::Lnf,
        Self::LnfMean,
        Self::LnfRstd,
        Self::Logits,
        Self::Probs,
        Self::Losses,
    ];

    /// Index of this tensor within the activation arena.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Element count of this tensor for sequence length `t`.
    pub fn element_count(self, hyperparameters: &Hyperparameters, t: usize) -> usize {
        let Hyperparameters {
            n_vocab,
            n_embd,
            n_head,
            n_layer,
            ..
        } = *hyperparameters;
        match self {
            Self::Encoded | Self::Lnf => t * n_embd,
            Self::Ln1
            | Self::Atty
            | Self::AttProj
            | Self::Residual2
            | Self::Ln2
            | Self::FcProj
            | Self::Residual3 => n_layer * t * n_embd,
            Self::Ln1Mean | Self::Ln1Rstd | Self::Ln2Mean | Self::Ln2Rstd => n_layer * t,
            Self::Qkv => n_layer * t * 3 * n_embd,
            Self::Preatt | Self::Att => n_layer * n_head * t * t,
            Self::Fch | Self::FchGelu => n_layer * t * 4 * n_embd,
            Self::LnfMean | Self::LnfRstd | Self::Losses => t,
            Self::Logits | Self::Probs => t * n_vocab,
        }
    }
}

/// The activation arena for one inference session.
pub struct Activations {
    arena: TensorArena,
    sizes: [usize; 23],
    seq_len: usize,
}

impl Activations {
    /// Allocates the arena for the given working sequence length.
    pub fn new(hyperparameters: &Hyperparameters, seq_len: usize) -> Result<Self, LoadError> {
        let sizes = Activation::ALL.map(|a| a.element_count(hyperparameters, seq_len));
        Ok(Self {
            arena: TensorArena::new(&sizes)?,
            sizes,
            seq_len,
        })
    }

    /// The working sequence length the arena was sized for.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Total size of the arena in bytes.
    pub fn byte_count(&self) -> usize {
        self.arena.byte_count()
    }

    /// The tensor holding a given activation.
    pub fn tensor(&self, activation: Activation) -> &[f32] {
        self.arena.tensor(activation.index())
    }

    /// The probability row of position `t - 1` after a forward pass of
    /// effective length `t`.
    pub fn probs_row(&self, t: usize, n_vocab: usize) -> &[f32] {
        &self.tensor(Activation::Probs)[(t - 1) * n_vocab..][..n_vocab]
    }

    /// Splits the arena into one disjoint mutable view per tensor that
    /// the forward pass writes. The reserved losses tensor stays out.
    pub(crate) fn split_mut(&mut self) -> ActTensors<'_> {
        let sizes = self.sizes;
        let (encoded, rest) = self.arena.as_mut_slice().split_at_mut(sizes[0]);
        let (ln1, rest) = rest.split_at_mut(sizes[1]);
        let (ln1_mean, rest) = rest.split_at_mut(sizes[2]);
        let (ln1_rstd, rest) = rest.split_at_mut(sizes[3]);
        let (qkv, rest) = rest.split_at_mut(sizes[4]);
        let (atty, rest) = rest.split_at_mut(sizes[5]);
        let (preatt, rest) = rest.split_at_mut(sizes[6]);
        let (att, rest) = rest.split_at_mut(sizes[7]);
        let (attproj, rest) = rest.split_at_mut(sizes[8]);
        let (residual2, rest) = rest.split_at_mut(sizes[9]);
        let (ln2, rest) = rest.split_at_mut(sizes[10]);
        let (ln2_mean, rest) = rest.split_at_mut(sizes[11]);
        let (ln2_rstd, rest) = rest.split_at_mut(sizes[12]);
        let (fch, rest) = rest.split_at_mut(sizes[13]);
        let (fch_gelu, rest) = rest.split_at_mut(sizes[14]);
        let (fcproj, rest) = rest.split_at_mut(sizes[15]);
        let (residual3, rest) = rest.split_at_mut(sizes[16]);
        let (lnf, rest) = rest.split_at_mut(sizes[17]);
        let (lnf_mean, rest) = rest.split_at_mut(sizes[18]);
        let (lnf_rstd, rest) = rest.split_at_mut(sizes[19]);
        let (logits, rest) = rest.split_at_mut(sizes[20]);
        let (probs, _losses) = rest.split_at_mut(sizes[21]);
        ActTensors {
            encoded,
            ln1,
            ln1_mean,
            ln1_rstd,
            qkv,
            atty,
            preatt,
            att,
            attproj,
            residual2,
            ln2,
            ln2_mean,
            ln2_rstd,
            fch,
            fch_gelu,
            fcproj,
            residual3,
            lnf,
            lnf_mean,
            lnf_rstd,
            logits,
            probs,
        }
    }
}

/// Disjoint mutable views of the activation tensors a forward pass
/// touches.
pub(crate) struct ActTensors<'a> {
    pub encoded: &'a mut [f32],
    pub ln1: &'a mut [f32],
    pub ln1_mean: &'a mut [f32],
    pub ln1_rstd: &'a mut [f32],
    pub qkv: &'a mut [f32],
    pub atty: &'a mut [f32],
    pub preatt: &'a mut [f32],
    pub att: &'a mut [f32],
    pub attproj: &'a mut [f32],
    pub residual2: &'a mut [f32],
    pub ln2: &'a mut [f32],
    pub ln2_mean: &'a mut [f32],
    pub ln2_rstd: &'a mut [f32],
    pub fch: &'a mut [f32],
    pub fch_gelu: &'a mut [f32],
    pub fcproj: &'a mut [f32],
    pub residual3: &'a mut [f32],
    pub lnf: &'a mut [f32],
    pub lnf_mean: &'a mut [f32],
    pub lnf_rstd: &'a mut [f32],
    pub logits: &'a mut [f32],
    pub probs: &'a mut [f32],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_for_a_small_model() {
        let hyperparameters = Hyperparameters {
            n_vocab: 16,
            n_ctx: 8,
            n_embd: 8,
            n_head: 2,
            n_layer: 2,
        };
        let t = 4;
        let count = |a: Activation| a.element_count(&hyperparameters, t);

        assert_eq!(count(Activation::Encoded), 32);
        assert_eq!(count(Activation::Ln1), 64);
        assert_eq!(count(Activation::Qkv), 192);
        assert_eq!(count(Activation::Preatt), 64);
        assert_eq!(count(Activation::Fch), 256);
        assert_eq!(count(Activation::Logits), 64);
        assert_eq!(count(Activation::Losses), 4);

        let acts = Activations::new(&hyperparameters, t).unwrap();
        let total: usize = Activation::ALL
            .iter()
            .map(|a| a.element_count(&hyperparameters, t))
            .sum();
        assert_eq!(acts.byte_count(), total * 4);
        assert_eq!(acts.seq_len(), t);
    }

    #[test]
    fn views_cover_every_written_tensor() {
        let hyperparameters = Hyperparameters {
            n_vocab: 4,
            n_ctx: 4,
            n_embd: 2,
            n_head: 1,
            n_layer: 1,
        };
        let mut acts = Activations::new(&hyperparameters, 2).unwrap();
        let views = acts.split_mut();
        assert_eq!(views.encoded.len(), 4);
        assert_eq!(views.preatt.len(), 4);
        assert_eq!(views.probs.len(), 8);
        views.probs[0] = 1.0;
        drop(views);
        assert_eq!(acts.tensor(Activation::Probs)[0], 1.0);
    }
}
