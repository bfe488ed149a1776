// ============================================================
// Layer 5: Additive Attention
// ============================================================
// At every decoder step, score each source position against the
// current decoder hidden state and blend the encoder states:
//
//   e_j = vᵀ · tanh(K_j + W·q)        K = Wₖ · encoder_states (once per batch)
//   α   = softmax(e) with α_j = 0 wherever the source is padding
//   c   = Σ_j α_j · encoder_state_j
//
// Only the key projection is shared across steps; the weights and the
// context vector are recomputed on every call.

use burn::{
    nn::Linear,
    prelude::*,
    tensor::activation::{softmax, tanh},
};

use crate::ml::param_init::ParamInit;

/// Score given to padded positions before the softmax; exp() of it underflows to 0.
const MASKED_SCORE: f32 = -1.0e9;

#[derive(Module, Debug)]
pub struct AdditiveAttention<B: Backend> {
    pub key:   Linear<B>,
    pub query: Linear<B>,
    pub score: Linear<B>,
}

impl<B: Backend> AdditiveAttention<B> {
    pub fn new(
        init:    &mut ParamInit,
        d_state: usize,
        d_query: usize,
        d_attn:  usize,
        device:  &B::Device,
    ) -> Self {
        Self {
            key:   init.linear(d_state, d_attn, false, device),
            query: init.linear(d_query, d_attn, true, device),
            score: init.linear(d_attn, 1, false, device),
        }
    }

    /// Project encoder states `[N, S, d_state]` into attention keys `[N, S, d_attn]`.
    pub fn keys(&self, states: Tensor<B, 3>) -> Tensor<B, 3> {
        self.key.forward(states)
    }

    /// Returns `(context [N, d_state], weights [N, S])`.
    pub fn forward(
        &self,
        query:  Tensor<B, 2>,
        keys:   Tensor<B, 3>,
        states: Tensor<B, 3>,
        mask:   Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, src_len, d_attn] = keys.dims();
        let [_, _, d_state] = states.dims();

        let q = self
            .query
            .forward(query)
            .reshape([batch, 1, d_attn])
            .expand([batch, src_len, d_attn]);
        let energy = tanh(keys + q);
        let scores = self.score.forward(energy).reshape([batch, src_len]);

        let padding = mask.clone().equal_elem(0.0);
        let weights = softmax(scores.mask_fill(padding, MASKED_SCORE), 1) * mask;

        let context = weights
            .clone()
            .reshape([batch, 1, src_len])
            .matmul(states)
            .reshape([batch, d_state]);

        (context, weights)
    }
}
