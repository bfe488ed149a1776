// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn tensor code apart from the
// batch-to-tensor conversion in data::batcher.
//
// What's in this layer:
//
//   param_init.rs - Seeded uniform initialisation for every weight
//
//   lstm.rs       - LSTM cell with per-row masking
//
//   encoder.rs    - Bidirectional, stackable LSTM encoder
//
//   attention.rs  - Additive attention over encoder states,
//                   padded positions weighted exactly 0
//
//   decoder.rs    - Attention LSTM decoder with input feeding
//
//   traits.rs     - Encoder / decoder / model capability contracts
//                   and the masked cross-entropy loss
//
//   model.rs      - Seq2SeqConfig and the assembled Seq2Seq network
//
//   schedule.rs   - Warm-up + step-decay learning rate
//
//   trainer.rs    - Teacher-forced training loop with progress
//                   callback and per-epoch validation
//
//   search.rs     - Greedy and beam search over the decoder
//
//   inferencer.rs - Loaded model + vocabularies → translate()
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Bahdanau et al. (2015), Luong et al. (2015)

/// Seeded parameter initialisation
pub mod param_init;

/// Maskable LSTM cell
pub mod lstm;

/// Model capability traits and the training loss
pub mod traits;

/// Bidirectional LSTM encoder
pub mod encoder;

/// Additive attention
pub mod attention;

/// Attention LSTM decoder
pub mod decoder;

/// Seq2Seq architecture config and model
pub mod model;

/// Learning-rate schedule
pub mod schedule;

/// Training loop with validation
pub mod trainer;

/// Greedy and beam search
pub mod search;

/// Inference engine: loads an artifact and translates sentences
pub mod inferencer;
