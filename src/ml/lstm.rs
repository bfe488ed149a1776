// ============================================================
// Layer 5: LSTM Cell
// ============================================================
// A single LSTM step written out over Burn tensors so it can be
// masked per row:
//
//   gates = W·x + U·h            [batch, 4·hidden]
//   i, f, o = σ(gates slices)    g = tanh(gate slice)
//   c' = f ⊙ c + i ⊙ g
//   h' = o ⊙ tanh(c')
//
// masked_step() only advances rows whose mask is 1. Rows with mask 0
// carry the previous (h, c) through unchanged, which keeps padded
// positions from leaking into the recurrence.

use burn::{
    nn::Linear,
    prelude::*,
    tensor::activation::{sigmoid, tanh},
};

use crate::ml::param_init::ParamInit;

#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    /// x → 4·hidden, with bias
    pub input:     Linear<B>,
    /// h → 4·hidden, no bias
    pub recurrent: Linear<B>,
    pub hidden:    usize,
}

/// Recurrent state of one LSTM layer, `[batch, hidden]` each.
#[derive(Debug, Clone)]
pub struct LstmState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell:   Tensor<B, 2>,
}

impl<B: Backend> LstmState<B> {
    pub fn zeros(batch: usize, hidden: usize, device: &B::Device) -> Self {
        Self {
            hidden: Tensor::zeros([batch, hidden], device),
            cell:   Tensor::zeros([batch, hidden], device),
        }
    }
}

impl<B: Backend> LstmCell<B> {
    pub fn new(init: &mut ParamInit, d_input: usize, hidden: usize, device: &B::Device) -> Self {
        Self {
            input:     init.linear(d_input, 4 * hidden, true, device),
            recurrent: init.linear(hidden, 4 * hidden, false, device),
            hidden,
        }
    }

    pub fn step(&self, x: Tensor<B, 2>, state: &LstmState<B>) -> LstmState<B> {
        let [batch, _] = x.dims();
        let h = self.hidden;

        let gates = self.input.forward(x) + self.recurrent.forward(state.hidden.clone());
        let i = sigmoid(gates.clone().slice([0..batch, 0..h]));
        let f = sigmoid(gates.clone().slice([0..batch, h..2 * h]));
        let g = tanh(gates.clone().slice([0..batch, 2 * h..3 * h]));
        let o = sigmoid(gates.slice([0..batch, 3 * h..4 * h]));

        let cell   = f * state.cell.clone() + i * g;
        let hidden = o * tanh(cell.clone());
        LstmState { hidden, cell }
    }

    /// `mask` is `[batch, 1]` with 1.0 for rows to advance and 0.0 for rows to hold.
    pub fn masked_step(
        &self,
        x:     Tensor<B, 2>,
        state: &LstmState<B>,
        mask:  Tensor<B, 2>,
    ) -> LstmState<B> {
        let next = self.step(x, state);
        let [batch, _] = next.hidden.dims();

        let keep = mask.expand([batch, self.hidden]);
        let hold = keep.clone().neg().add_scalar(1.0);

        LstmState {
            hidden: next.hidden * keep.clone() + state.hidden.clone() * hold.clone(),
            cell:   next.cell * keep + state.cell.clone() * hold,
        }
    }
}
