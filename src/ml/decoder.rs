// ============================================================
// Layer 5: Attention LSTM Decoder
// ============================================================
// One decoder transition, repeated until </s> or the length limit:
//
//   previous token ─► embedding [N, H] ─┐
//   previous attentional vector [N, H] ─┴─ concat ─► LSTM stack ─► h_t
//   h_t + encoder memory ─► attention ─► context c_t [N, 2H]
//   tanh(W_c · [h_t ; c_t]) ─► attentional vector h̃_t [N, H]
//   W_o · h̃_t ─► logits over the target vocabulary
//
// h̃_t is carried in the state and fed into the next step
// (input feeding). During training the previous token is the
// ground truth; during search it is the token the search picked.
//
// Start state: all-zero LSTM states and a zero attentional vector.

use burn::{
    nn::{Embedding, Linear},
    prelude::*,
    tensor::activation::tanh,
};

use crate::ml::attention::AdditiveAttention;
use crate::ml::lstm::{LstmCell, LstmState};
use crate::ml::param_init::ParamInit;
use crate::ml::traits::{DecoderState, DecoderStep, EncoderMemory, StepDecoder};

#[derive(Module, Debug)]
pub struct AttentionDecoder<B: Backend> {
    pub embedding: Embedding<B>,
    pub layers:    Vec<LstmCell<B>>,
    pub attention: AdditiveAttention<B>,
    pub combine:   Linear<B>,
    pub output:    Linear<B>,
    pub hidden:    usize,
}

impl<B: Backend> AttentionDecoder<B> {
    /// `d_memory` is the width of each encoder output vector.
    pub fn new(
        init:       &mut ParamInit,
        vocab_size: usize,
        hidden:     usize,
        d_memory:   usize,
        depth:      usize,
        device:     &B::Device,
    ) -> Self {
        let embedding = init.embedding(vocab_size, hidden, device);
        let layers = (0..depth)
            .map(|i| {
                let d_input = if i == 0 { 2 * hidden } else { hidden };
                LstmCell::new(init, d_input, hidden, device)
            })
            .collect();
        let attention = AdditiveAttention::new(init, d_memory, hidden, hidden, device);
        let combine   = init.linear(hidden + d_memory, hidden, true, device);
        let output    = init.linear(hidden, vocab_size, true, device);

        Self { embedding, layers, attention, combine, output, hidden }
    }
}

impl<B: Backend> StepDecoder<B> for AttentionDecoder<B> {
    fn attend_to(&self, states: Tensor<B, 3>, mask: Tensor<B, 2>) -> EncoderMemory<B> {
        let keys = self.attention.keys(states.clone());
        EncoderMemory { states, keys, mask }
    }

    fn start_state(&self, memory: &EncoderMemory<B>) -> DecoderState<B> {
        let [batch, _] = memory.mask.dims();
        let device = memory.mask.device();
        DecoderState {
            layers: self
                .layers
                .iter()
                .map(|_| LstmState::zeros(batch, self.hidden, &device))
                .collect(),
            feed: Tensor::zeros([batch, self.hidden], &device),
        }
    }

    fn step(
        &self,
        previous: Tensor<B, 1, Int>,
        state:    DecoderState<B>,
        memory:   &EncoderMemory<B>,
    ) -> DecoderStep<B> {
        let [batch] = previous.dims();
        let DecoderState { layers: previous_layers, feed } = state;

        let embedded = self
            .embedding
            .forward(previous.reshape([batch, 1]))
            .reshape([batch, self.hidden]);

        let mut input  = Tensor::cat(vec![embedded, feed], 1);
        let mut layers = Vec::with_capacity(self.layers.len());
        for (cell, layer_state) in self.layers.iter().zip(&previous_layers) {
            let next = cell.step(input, layer_state);
            input = next.hidden.clone();
            layers.push(next);
        }

        let (context, attention) = self.attention.forward(
            input.clone(),
            memory.keys.clone(),
            memory.states.clone(),
            memory.mask.clone(),
        );
        let feed   = tanh(self.combine.forward(Tensor::cat(vec![input, context], 1)));
        let logits = self.output.forward(feed.clone());

        DecoderStep {
            logits,
            state: DecoderState { layers, feed },
            attention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_step_shapes_and_attention_mass() {
        let device  = Default::default();
        let mut init = ParamInit::new(2, 0.3);
        let decoder = AttentionDecoder::<TestBackend>::new(&mut init, 12, 4, 8, 2, &device);

        let states = init.uniform::<TestBackend, 3>([2, 3, 8], &device);
        let mask   = Tensor::<TestBackend, 1>::from_floats(
            [1.0f32, 1.0, 1.0, 1.0, 0.0, 0.0].as_slice(),
            &device,
        )
        .reshape([2, 3]);
        let memory = decoder.attend_to(states, mask);

        let previous = Tensor::<TestBackend, 1, Int>::from_ints([2i32, 2].as_slice(), &device);
        let step     = decoder.step(previous, decoder.start_state(&memory), &memory);

        assert_eq!(step.logits.dims(), [2, 12]);
        assert_eq!(step.state.layers.len(), 2);
        assert_eq!(step.state.feed.dims(), [2, 4]);

        let w: Vec<f32> = step.attention.into_data().to_vec::<f32>().unwrap();
        assert!((w[..3].iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((w[3] - 1.0).abs() < 1e-5);
        assert_eq!(&w[4..], &[0.0, 0.0]);
    }
}
