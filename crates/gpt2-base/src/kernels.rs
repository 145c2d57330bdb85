//! Forward-pass compute kernels.
//!
//! All shapes are row-major with the batch dimension fixed at one, so a
//! kernel sees `[t, …]` slices where `t` is the runtime sequence length.
//! The matrix multiplies, attention and the vocabulary softmax are the
//! compute-bound kernels; they run on rayon over disjoint output rows.
//! Within one output row the summation order is fixed, so results match
//! a sequential execution exactly.

use std::f32::consts::PI;

use rayon::prelude::*;

use crate::TokenId;

/// Sums token and position embeddings: `out[j, :] = wte[in[j], :] + wpe[j, :]`.
///
/// Token ids must lie in `[0, n_vocab)`; the generation loop only ever
/// supplies ids produced by the sampler or the end-of-text sentinel.
pub fn encoder_forward(out: &mut [f32], tokens: &[TokenId], wte: &[f32], wpe: &[f32], c: usize) {
    for (j, (out_t, &id)) in out.chunks_exact_mut(c).zip(tokens).enumerate() {
        let wte_ix = &wte[id as usize * c..][..c];
        let wpe_t = &wpe[j * c..][..c];
        for (o, (x, p)) in out_t.iter_mut().zip(wte_ix.iter().zip(wpe_t)) {
            *o = x + p;
        }
    }
}

/// Layer normalization over the channel dimension.
///
/// The per-position mean and reciprocal standard deviation are persisted
/// into `mean` and `rstd`; inference never reads them back, but the
/// activation layout keeps them for compatibility with training-era
/// checkpoint tooling.
pub fn layernorm_forward(
    out: &mut [f32],
    mean: &mut [f32],
    rstd: &mut [f32],
    inp: &[f32],
    weight: &[f32],
    bias: &[f32],
    c: usize,
) {
    let eps = 1e-5f32;
    for (j, (out_t, x)) in out.chunks_exact_mut(c).zip(inp.chunks_exact(c)).enumerate() {
        let mut m = 0.0f32;
        for &v in x {
            m += v;
        }
        m /= c as f32;

        let mut v = 0.0f32;
        for &xi in x {
            let xshift = xi - m;
            v += xshift * xshift;
        }
        v /= c as f32;

        let s = 1.0 / (v + eps).sqrt();
        for (k, o) in out_t.iter_mut().enumerate() {
            *o = s * (x[k] - m) * weight[k] + bias[k];
        }
        mean[j] = m;
        rstd[j] = s;
    }
}

/// Matrix multiply with bias: `out[j, k] = bias[k] + inp[j, :] · weight[k, :]`,
/// with `weight` row-major `[oc, c]`.
pub fn matmul_forward(
    out: &mut [f32],
    inp: &[f32],
    weight: &[f32],
    bias: &[f32],
    c: usize,
    oc: usize,
) {
    matmul(out, inp, weight, Some(bias), c, oc);
}

/// Matrix multiply without bias; used for the tied unembedding.
pub fn matmul_forward_nobias(out: &mut [f32], inp: &[f32], weight: &[f32], c: usize, oc: usize) {
    matmul(out, inp, weight, None, c, oc);
}

fn matmul(out: &mut [f32], inp: &[f32], weight: &[f32], bias: Option<&[f32]>, c: usize, oc: usize) {
    debug_assert_eq!(out.len() / oc, inp.len() / c);
    out.par_chunks_mut(oc)
        .zip(inp.par_chunks(c))
        .for_each(|(out_t, inp_t)| {
            for (k, o) in out_t.iter_mut().enumerate() {
                let wrow = &weight[k * c..][..c];
                let mut val = bias.map_or(0.0, |bias| bias[k]);
                for (x, w) in inp_t.iter().zip(wrow) {
                    val += x * w;
                }
                *o = val;
            }
        });
}

/// Causal multi-head self-attention.
///
/// `qkv` is `[t, 3c]` with each position laid out as the concatenated
/// query, key and value vectors of all heads. Raw scores land in
/// `preatt`, normalized weights in `att` (both `[nh, t, t]`), the mixed
/// values in `out` (`[t, c]`). Future positions are masked to exactly
/// zero in `att`, and a zero score sum yields an all-zero row.
pub fn attention_forward(
    out: &mut [f32],
    preatt: &mut [f32],
    att: &mut [f32],
    qkv: &[f32],
    t: usize,
    c: usize,
    nh: usize,
) {
    let c3 = 3 * c;
    let hs = c / nh;
    let scale = 1.0 / (hs as f32).sqrt();

    // Scores and their masked softmax, one head per worker.
    preatt
        .par_chunks_mut(t * t)
        .zip(att.par_chunks_mut(t * t))
        .enumerate()
        .for_each(|(h, (preatt_h, att_h))| {
            for j in 0..t {
                let query = &qkv[j * c3 + h * hs..][..hs];
                let preatt_jh = &mut preatt_h[j * t..][..t];
                let att_jh = &mut att_h[j * t..][..t];

                let mut maxval = -10000.0f32;
                for m in 0..=j {
                    let key = &qkv[m * c3 + c + h * hs..][..hs];
                    let mut val = 0.0f32;
                    for (q, k) in query.iter().zip(key) {
                        val += q * k;
                    }
                    val *= scale;
                    if val > maxval {
                        maxval = val;
                    }
                    preatt_jh[m] = val;
                }

                let mut expsum = 0.0f32;
                for m in 0..=j {
                    let expv = (preatt_jh[m] - maxval).exp();
                    expsum += expv;
                    att_jh[m] = expv;
                }
                let expsum_inv = if expsum == 0.0 { 0.0 } else { 1.0 / expsum };

                for (m, a) in att_jh.iter_mut().enumerate() {
                    if m <= j {
                        *a *= expsum_inv;
                    } else {
                        *a = 0.0;
                    }
                }
            }
        });

    // Value mix, one query row per worker.
    let att: &[f32] = att;
    out.par_chunks_mut(c).enumerate().for_each(|(j, out_j)| {
        out_j.fill(0.0);
        for h in 0..nh {
            let att_jh = &att[h * t * t + j * t..][..t];
            let out_jh = &mut out_j[h * hs..][..hs];
            for m in 0..=j {
                let value = &qkv[m * c3 + 2 * c + h * hs..][..hs];
                let a = att_jh[m];
                for (o, v) in out_jh.iter_mut().zip(value) {
                    *o += a * v;
                }
            }
        }
    });
}

/// GELU activation, tanh approximation.
pub fn gelu_forward(out: &mut [f32], inp: &[f32]) {
    let s = (2.0f32 / PI).sqrt();
    for (o, &x) in out.iter_mut().zip(inp) {
        let cube = 0.044715 * x * x * x;
        *o = 0.5 * x * (1.0 + (s * (x + cube)).tanh());
    }
}

/// Element-wise sum of two tensors.
pub fn residual_forward(out: &mut [f32], inp1: &[f32], inp2: &[f32]) {
    for (o, (a, b)) in out.iter_mut().zip(inp1.iter().zip(inp2)) {
        *o = a + b;
    }
}

/// Numerically stable softmax of each `v`-wide logit row.
pub fn softmax_forward(probs: &mut [f32], logits: &[f32], v: usize) {
    probs
        .par_chunks_mut(v)
        .zip(logits.par_chunks(v))
        .for_each(|(probs_t, logits_t)| {
            let mut maxval = -10000.0f32;
            for &l in logits_t {
                if l > maxval {
                    maxval = l;
                }
            }
            let mut sum = 0.0f32;
            for (p, &l) in probs_t.iter_mut().zip(logits_t) {
                *p = (l - maxval).exp();
                sum += *p;
            }
            for p in probs_t {
                *p /= sum;
            }
        });
}
