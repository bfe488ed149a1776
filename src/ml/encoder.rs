// ============================================================
// Layer 5: Bidirectional LSTM Encoder
// ============================================================
// Turns a padded batch of source ids into one vector per position
// that depends on the whole sentence:
//
//   ids [N, S] ─► embedding [N, S, H]
//       ─► layer 1:  forward LSTM  →→→   ┐
//                    backward LSTM ←←←   ┴─ concat ─► [N, S, 2H]
//       ─► layer 2 … (each layer reads the previous layer's output)
//
// Padding discipline: both directions use masked_step(), so a padded
// position never advances the recurrence, and every layer's output is
// multiplied by the mask so padded positions are exactly zero going
// into the next layer and into attention.

use burn::{nn::Embedding, prelude::*};

use crate::ml::lstm::{LstmCell, LstmState};
use crate::ml::param_init::ParamInit;
use crate::ml::traits::SourceEncoder;

#[derive(Module, Debug)]
pub struct BiLstmLayer<B: Backend> {
    pub forward:  LstmCell<B>,
    pub backward: LstmCell<B>,
}

#[derive(Module, Debug)]
pub struct BiLstmEncoder<B: Backend> {
    pub embedding: Embedding<B>,
    pub layers:    Vec<BiLstmLayer<B>>,
    pub hidden:    usize,
}

impl<B: Backend> BiLstmEncoder<B> {
    pub fn new(
        init:       &mut ParamInit,
        vocab_size: usize,
        hidden:     usize,
        depth:      usize,
        device:     &B::Device,
    ) -> Self {
        let embedding = init.embedding(vocab_size, hidden, device);
        let layers = (0..depth)
            .map(|i| {
                let d_input = if i == 0 { hidden } else { 2 * hidden };
                BiLstmLayer {
                    forward:  LstmCell::new(init, d_input, hidden, device),
                    backward: LstmCell::new(init, d_input, hidden, device),
                }
            })
            .collect();
        Self { embedding, layers, hidden }
    }

    fn run_layer(&self, layer: &BiLstmLayer<B>, x: Tensor<B, 3>, mask: &Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, seq_len, d_input] = x.dims();
        let device = x.device();
        let h = self.hidden;

        let input_at = |t: usize| {
            x.clone()
                .slice([0..batch, t..t + 1, 0..d_input])
                .reshape([batch, d_input])
        };
        let mask_at = |t: usize| mask.clone().slice([0..batch, t..t + 1]);

        let mut forward = Vec::with_capacity(seq_len);
        let mut state   = LstmState::zeros(batch, h, &device);
        for t in 0..seq_len {
            state = layer.forward.masked_step(input_at(t), &state, mask_at(t));
            forward.push(state.hidden.clone());
        }

        let mut backward = Vec::with_capacity(seq_len);
        let mut state    = LstmState::zeros(batch, h, &device);
        for t in (0..seq_len).rev() {
            state = layer.backward.masked_step(input_at(t), &state, mask_at(t));
            backward.push(state.hidden.clone());
        }
        backward.reverse();

        let positions: Vec<Tensor<B, 3>> = forward
            .into_iter()
            .zip(backward)
            .map(|(f, b)| Tensor::cat(vec![f, b], 1).reshape([batch, 1, 2 * h]))
            .collect();

        let out = Tensor::cat(positions, 1);
        let keep = mask.clone().reshape([batch, seq_len, 1]).expand([batch, seq_len, 2 * h]);
        out * keep
    }
}

impl<B: Backend> SourceEncoder<B> for BiLstmEncoder<B> {
    fn encode(&self, tokens: Tensor<B, 2, Int>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let mut x = self.embedding.forward(tokens);
        for layer in &self.layers {
            x = self.run_layer(layer, x, &mask);
        }
        x
    }

    fn output_size(&self) -> usize {
        2 * self.hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ids(rows: &[[i32; 5]]) -> Tensor<TestBackend, 2, Int> {
        let flat: Vec<i32> = rows.iter().flatten().copied().collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), 5])
    }

    fn mask(rows: &[[f32; 5]]) -> Tensor<TestBackend, 2> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), &Default::default())
            .reshape([rows.len(), 5])
    }

    fn encoder(depth: usize) -> BiLstmEncoder<TestBackend> {
        BiLstmEncoder::new(&mut ParamInit::new(11, 0.3), 20, 6, depth, &Default::default())
    }

    #[test]
    fn test_output_shape() {
        let enc = encoder(2);
        let out = enc.encode(ids(&[[4, 5, 6, 0, 0]]), mask(&[[1.0, 1.0, 1.0, 0.0, 0.0]]));
        assert_eq!(out.dims(), [1, 5, enc.output_size()]);
    }

    #[test]
    fn test_padding_never_affects_real_positions() {
        let enc = encoder(2);
        let m   = mask(&[[1.0, 1.0, 1.0, 0.0, 0.0]]);

        let clean     = enc.encode(ids(&[[4, 5, 6, 0, 0]]), m.clone());
        let perturbed = enc.encode(ids(&[[4, 5, 6, 17, 9]]), m);

        let clean: Vec<f32>     = clean.into_data().to_vec::<f32>().unwrap();
        let perturbed: Vec<f32> = perturbed.into_data().to_vec::<f32>().unwrap();
        // three real positions × 12 values each
        assert_eq!(&clean[..36], &perturbed[..36]);
        assert!(clean[36..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_batched_equals_unbatched() {
        let enc = encoder(1);
        let batched = enc.encode(
            ids(&[[4, 5, 6, 7, 8], [9, 10, 0, 0, 0]]),
            mask(&[[1.0; 5], [1.0, 1.0, 0.0, 0.0, 0.0]]),
        );
        let single = enc.encode(ids(&[[9, 10, 0, 0, 0]]), mask(&[[1.0, 1.0, 0.0, 0.0, 0.0]]));

        let batched: Vec<f32> = batched.into_data().to_vec::<f32>().unwrap();
        let single: Vec<f32>  = single.into_data().to_vec::<f32>().unwrap();
        for (a, b) in batched[60..].iter().zip(&single) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
