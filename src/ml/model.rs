// ============================================================
// Layer 5: Seq2Seq Model (BiLSTM encoder + attention decoder)
// ============================================================
//   source ids ─► BiLstmEncoder ─► states [N, S, 2H]
//                                     │
//   <s> w1 … ─► AttentionDecoder ◄────┘  (attention every step)
//                     │
//                     ▼
//               logits [N, V_tgt] per step
//
// Embedding size equals the hidden size on both sides.
// All weights come from one ParamInit seeded by `seed`.

use burn::prelude::*;

use crate::error::NmtError;
use crate::ml::decoder::AttentionDecoder;
use crate::ml::encoder::BiLstmEncoder;
use crate::ml::param_init::ParamInit;
use crate::ml::traits::{
    DecoderState, DecoderStep, EncoderMemory, SourceEncoder, StepDecoder, TranslationModel,
};

/// Smallest vocabulary the model accepts: the four reserved symbols.
const MIN_VOCAB_SIZE: usize = 4;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally. Do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub source_vocab_size: usize,
    pub target_vocab_size: usize,
    /// Hidden size of every LSTM and of both embeddings.
    pub hidden_size:       usize,
    #[config(default = 1)]
    pub encoder_layers:    usize,
    #[config(default = 1)]
    pub decoder_layers:    usize,
    /// Initial weights are uniform in [-init_scale, init_scale].
    #[config(default = 0.1)]
    pub init_scale:        f64,
    #[config(default = 42)]
    pub seed:              u64,
}

impl Seq2SeqConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.hidden_size == 0 {
            return Err(NmtError::config("hidden size must be > 0"));
        }
        if self.encoder_layers == 0 || self.decoder_layers == 0 {
            return Err(NmtError::config("encoder and decoder depth must be >= 1"));
        }
        if self.source_vocab_size < MIN_VOCAB_SIZE || self.target_vocab_size < MIN_VOCAB_SIZE {
            return Err(NmtError::config(format!(
                "vocabularies must hold at least the {MIN_VOCAB_SIZE} reserved symbols"
            )));
        }
        if !(self.init_scale.is_finite() && self.init_scale > 0.0) {
            return Err(NmtError::config("init scale must be a positive finite number"));
        }
        Ok(())
    }

    /// True when both configs produce parameter tensors of identical shapes.
    /// Seed and init scale only affect starting values, not shapes.
    pub fn same_architecture(&self, other: &Self) -> bool {
        self.source_vocab_size == other.source_vocab_size
            && self.target_vocab_size == other.target_vocab_size
            && self.hidden_size == other.hidden_size
            && self.encoder_layers == other.encoder_layers
            && self.decoder_layers == other.decoder_layers
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2Seq<B> {
        let mut init = ParamInit::new(self.seed, self.init_scale);
        let encoder = BiLstmEncoder::new(
            &mut init,
            self.source_vocab_size,
            self.hidden_size,
            self.encoder_layers,
            device,
        );
        let decoder = AttentionDecoder::new(
            &mut init,
            self.target_vocab_size,
            self.hidden_size,
            encoder.output_size(),
            self.decoder_layers,
            device,
        );
        Seq2Seq { encoder, decoder }
    }
}

#[derive(Module, Debug)]
pub struct Seq2Seq<B: Backend> {
    pub encoder: BiLstmEncoder<B>,
    pub decoder: AttentionDecoder<B>,
}

impl<B: Backend> TranslationModel<B> for Seq2Seq<B> {
    fn encode(&self, source: Tensor<B, 2, Int>, source_mask: Tensor<B, 2>) -> EncoderMemory<B> {
        let states = self.encoder.encode(source, source_mask.clone());
        self.decoder.attend_to(states, source_mask)
    }

    fn start_state(&self, memory: &EncoderMemory<B>) -> DecoderState<B> {
        self.decoder.start_state(memory)
    }

    fn decode_step(
        &self,
        previous: Tensor<B, 1, Int>,
        state:    DecoderState<B>,
        memory:   &EncoderMemory<B>,
    ) -> DecoderStep<B> {
        self.decoder.step(previous, state, memory)
    }

    fn target_vocab_size(&self) -> usize {
        self.decoder.output.weight.val().dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::PaddedBatch;
    use crate::domain::sentence_pair::EncodedPair;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config() -> Seq2SeqConfig {
        Seq2SeqConfig::new(10, 12, 8).with_seed(3)
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());
        assert!(Seq2SeqConfig::new(10, 12, 0).validate().is_err());
        assert!(Seq2SeqConfig::new(3, 12, 8).validate().is_err());
        assert!(config().with_decoder_layers(0).validate().is_err());
        assert!(config().with_init_scale(0.0).validate().is_err());
    }

    #[test]
    fn test_same_architecture_ignores_seed() {
        let a = config();
        assert!(a.same_architecture(&a.clone().with_seed(99)));
        assert!(!a.same_architecture(&a.clone().with_encoder_layers(2)));
    }

    #[test]
    fn test_same_seed_same_parameters() {
        let device = Default::default();
        let a: Seq2Seq<TestBackend> = config().init(&device);
        let b: Seq2Seq<TestBackend> = config().init(&device);
        let wa: Vec<f32> = a.decoder.output.weight.val().into_data().to_vec::<f32>().unwrap();
        let wb: Vec<f32> = b.decoder.output.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(wa, wb);
        assert_eq!(a.num_params(), b.num_params());
    }

    #[test]
    fn test_teacher_forced_shape() {
        let device = Default::default();
        let model: Seq2Seq<TestBackend> = config().with_encoder_layers(2).init(&device);
        let pairs = [EncodedPair::new(vec![4, 5, 6], vec![4, 5]), EncodedPair::new(vec![7], vec![6])];
        let refs: Vec<&EncodedPair> = pairs.iter().collect();
        let tensors = PaddedBatch::from_pairs(&refs).to_tensors::<TestBackend>(&device);

        let logits = model.forward_teacher_forced(&tensors);
        assert_eq!(logits.dims(), [2, 3, 12]);
        assert_eq!(model.target_vocab_size(), 12);

        let loss: f64 = model.forward_loss(&tensors).into_scalar().elem::<f64>();
        assert!(loss.is_finite() && loss > 0.0);
    }
}
