// ============================================================
// Layer 5: Model Capability Traits
// ============================================================
// Contracts between the network pieces and the code that drives them.
//
// The Trainer and the search routines only talk to TranslationModel,
// so a different encoder (self-attention, GRU, …) or decoder can sit
// behind it without either of them changing.

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::data::batcher::PairTensors;
use crate::ml::lstm::LstmState;

/// Everything the decoder needs from the encoder for one batch of sources.
#[derive(Debug, Clone)]
pub struct EncoderMemory<B: Backend> {
    /// Per-position encoder outputs `[batch, src_len, d_state]`, zero at padding.
    pub states: Tensor<B, 3>,
    /// Attention keys derived from `states`, `[batch, src_len, d_attn]`.
    pub keys:   Tensor<B, 3>,
    /// 1.0 for real source tokens, 0.0 for padding, `[batch, src_len]`.
    pub mask:   Tensor<B, 2>,
}

/// Recurrent decoder state carried from one step to the next.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    pub layers: Vec<LstmState<B>>,
    /// Attentional vector of the previous step, fed back as input.
    pub feed:   Tensor<B, 2>,
}

/// Output of a single decoder transition.
#[derive(Debug, Clone)]
pub struct DecoderStep<B: Backend> {
    /// Unnormalised next-token scores `[batch, tgt_vocab]`.
    pub logits:    Tensor<B, 2>,
    pub state:     DecoderState<B>,
    /// Attention weights used for this step `[batch, src_len]`.
    pub attention: Tensor<B, 2>,
}

/// Produces per-position hidden states from a padded source batch.
pub trait SourceEncoder<B: Backend> {
    fn encode(&self, tokens: Tensor<B, 2, Int>, mask: Tensor<B, 2>) -> Tensor<B, 3>;

    /// Width of each per-position output vector.
    fn output_size(&self) -> usize;
}

/// Produces the next-token distribution from (previous token, context, state).
pub trait StepDecoder<B: Backend> {
    /// Bind encoder outputs into the memory the decoder attends over.
    fn attend_to(&self, states: Tensor<B, 3>, mask: Tensor<B, 2>) -> EncoderMemory<B>;

    fn start_state(&self, memory: &EncoderMemory<B>) -> DecoderState<B>;

    fn step(
        &self,
        previous: Tensor<B, 1, Int>,
        state:    DecoderState<B>,
        memory:   &EncoderMemory<B>,
    ) -> DecoderStep<B>;
}

/// A complete encoder–attention–decoder translation network.
pub trait TranslationModel<B: Backend>: Module<B> {
    fn encode(&self, source: Tensor<B, 2, Int>, source_mask: Tensor<B, 2>) -> EncoderMemory<B>;

    fn start_state(&self, memory: &EncoderMemory<B>) -> DecoderState<B>;

    fn decode_step(
        &self,
        previous: Tensor<B, 1, Int>,
        state:    DecoderState<B>,
        memory:   &EncoderMemory<B>,
    ) -> DecoderStep<B>;

    fn target_vocab_size(&self) -> usize;

    /// Teacher-forced logits `[batch, tgt_len, tgt_vocab]`: step t sees the
    /// ground-truth token t−1 from `target_input`.
    fn forward_teacher_forced(&self, batch: &PairTensors<B>) -> Tensor<B, 3> {
        let memory = self.encode(batch.source.clone(), batch.source_mask.clone());
        let [n, len] = batch.target_input.dims();
        let vocab = self.target_vocab_size();

        let mut state = self.start_state(&memory);
        let mut steps = Vec::with_capacity(len);
        for t in 0..len {
            let previous = batch
                .target_input
                .clone()
                .slice([0..n, t..t + 1])
                .reshape([n]);
            let out = self.decode_step(previous, state, &memory);
            steps.push(out.logits.reshape([n, 1, vocab]));
            state = out.state;
        }
        Tensor::cat(steps, 1)
    }

    /// Token-level cross-entropy averaged over non-padding target positions.
    fn forward_loss(&self, batch: &PairTensors<B>) -> Tensor<B, 1> {
        masked_cross_entropy(
            self.forward_teacher_forced(batch),
            batch.target_output.clone(),
            batch.target_mask.clone(),
        )
    }
}

/// Mean negative log-likelihood over positions where `mask` is 1.
///
/// Burn's `CrossEntropyLoss` divides by every position, padding included,
/// so the masked mean is computed directly.
pub fn masked_cross_entropy<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    mask:    Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch, len, vocab] = logits.dims();
    let rows = batch * len;

    let log_probs = log_softmax(logits.reshape([rows, vocab]), 1);
    let picked    = log_probs.gather(1, targets.reshape([rows, 1])).reshape([rows]);
    let mask      = mask.reshape([rows]);
    let tokens    = mask.clone().sum();

    (picked * mask).sum().neg() / tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_masked_cross_entropy_ignores_padding() {
        let device = Default::default();
        // Two positions, uniform logits over 4 classes → loss ln 4 at each.
        let logits  = Tensor::<TestBackend, 3>::zeros([1, 2, 4], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([1i32, 0].as_slice(), &device).reshape([1, 2]);
        let mask    = Tensor::<TestBackend, 1>::from_floats([1.0f32, 0.0].as_slice(), &device).reshape([1, 2]);

        let loss: f64 = masked_cross_entropy(logits, targets, mask).into_scalar().elem::<f64>();
        assert!((loss - 4f64.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_masked_cross_entropy_prefers_correct_class() {
        let device  = Default::default();
        let logits  = Tensor::<TestBackend, 1>::from_floats([5.0f32, 0.0, 0.0].as_slice(), &device).reshape([1, 1, 3]);
        let right   = Tensor::<TestBackend, 1, Int>::from_ints([0i32].as_slice(), &device).reshape([1, 1]);
        let wrong   = Tensor::<TestBackend, 1, Int>::from_ints([2i32].as_slice(), &device).reshape([1, 1]);
        let mask    = Tensor::<TestBackend, 2>::ones([1, 1], &device);

        let good: f64 = masked_cross_entropy(logits.clone(), right, mask.clone()).into_scalar().elem::<f64>();
        let bad: f64  = masked_cross_entropy(logits, wrong, mask).into_scalar().elem::<f64>();
        assert!(good < bad);
    }
}
