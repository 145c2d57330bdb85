//! The parameter tensor table: the single source of truth for the
//! order, shapes and element counts of the sixteen weight tensors in a
//! checkpoint.

use crate::Hyperparameters;

/// Roles of the sixteen parameter tensors, in their order within the
/// checkpoint file.
///
/// Per-layer tensors are stacked along the layer dimension, so e.g.
/// [Parameter::QkvWeight] is `[n_layer, 3·n_embd, n_embd]` and a layer's
/// slice starts at `layer · 3 · n_embd · n_embd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Token embedding matrix, `[n_vocab, n_embd]`. Also reused,
    /// transposed, as the unembedding projection.
    Wte,
    /// Position embedding matrix, `[n_ctx, n_embd]`.
    Wpe,
    /// First layer-norm scale, `[n_layer, n_embd]`.
    Ln1Weight,
    /// First layer-norm shift, `[n_layer, n_embd]`.
    Ln1Bias,
    /// Fused query/key/value projection, `[n_layer, 3·n_embd, n_embd]`.
    QkvWeight,
    /// Fused query/key/value bias, `[n_layer, 3·n_embd]`.
    QkvBias,
    /// Attention output projection, `[n_layer, n_embd, n_embd]`.
    AttnProjWeight,
    /// Attention output bias, `[n_layer, n_embd]`.
    AttnProjBias,
    /// Second layer-norm scale, `[n_layer, n_embd]`.
    Ln2Weight,
    /// Second layer-norm shift, `[n_layer, n_embd]`.
    Ln2Bias,
    /// Feed-forward expansion, `[n_layer, 4·n_embd, n_embd]`.
    FcWeight,
    /// Feed-forward expansion bias, `[n_layer, 4·n_embd]`.
    FcBias,
    /// Feed-forward projection, `[n_layer, n_embd, 4·n_embd]`.
    FcProjWeight,
    /// Feed-forward projection bias, `[n_layer, n_embd]`.
    FcProjBias,
    /// Final layer-norm scale, `[n_embd]`.
    LnfWeight,
    /// Final layer-norm shift, `[n_embd]`.
    LnfBias,
}

impl Parameter {
    /// All parameter tensors in file order.
    pub const ALL: [Self; 16] = [
        Self::Wte,
        Self::Wpe,
        Self::Ln1Weight,
        Self::Ln1Bias,
        Self::QkvWeight,
        Self::QkvBias,
        Self::AttnProjWeight,
        Self::AttnProjBias,
        Self::Ln2Weight,
        Self::Ln2Bias,
        Self::FcWeight,
        Self::FcBias,
        Self::FcProjWeight,
        Self::FcProjBias,
        Self::LnfWeight,
        Self::LnfBias,
    ];

    /// Index of this tensor within the parameter arena.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Element count of this tensor under the given hyperparameters.
    pub fn element_count(self, hyperparameters: &Hyperparameters) -> usize {
        let Hyperparameters {
            n_vocab,
            n_ctx,
            n_embd,
            n_layer,
            ..
        } = *hyperparameters;
        let lc = n_layer * n_embd;
        match self {
            Self::Wte => n_vocab * n_embd,
            Self::Wpe => n_ctx * n_embd,
            Self::Ln1Weight
            | Self::Ln1Bias
            | Self::AttnProjBias
            | Self::Ln2Weight
            | Self::Ln2Bias
            | Self::FcProjBias => lc,
            Self::QkvWeight => lc * 3 * n_embd,
            Self::QkvBias => lc * 3,
            Self::AttnProjWeight => lc * n_embd,
            Self::FcWeight => lc * 4 * n_embd,
            Self::FcBias => lc * 4,
            Self::FcProjWeight => lc * 4 * n_embd,
            Self::LnfWeight | Self::LnfBias => n_embd,
        }
    }

    /// Element counts of all sixteen tensors, in file order.
    pub fn element_counts(hyperparameters: &Hyperparameters) -> [usize; 16] {
        Self::ALL.map(|parameter| parameter.element_count(hyperparameters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_counts_for_a_small_model() {
        let hyperparameters = Hyperparameters {
            n_vocab: 5,
            n_ctx: 4,
            n_embd: 4,
            n_head: 2,
            n_layer: 2,
        };
        let counts = Parameter::element_counts(&hyperparameters);
        assert_eq!(
            counts,
            [20, 16, 8, 8, 96, 24, 32, 8, 8, 8, 128, 32, 128, 8, 4, 4]
        );
        assert_eq!(counts.iter().sum::<usize>(), 532);
    }

    #[test]
    fn order_matches_the_arena_index() {
        for (i, parameter) in Parameter::ALL.iter().enumerate() {
            assert_eq!(parameter.index(), i);
        }
    }
}
