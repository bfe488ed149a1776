// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything from raw parallel text to padded tensor batches.
//
//   source / target files
//       │
//       ▼
//   ParallelCorpusLoader  → aligned line pairs
//       │
//       ▼
//   Preprocessor          → cleaned, whitespace-tokenised sentences
//       │
//       ▼
//   Vocabulary (domain)   → token indices
//       │
//       ▼
//   TokenBudgetBatcher    → length-filtered, budget-bounded batches
//       │
//       ▼
//   PairTensors           → teacher-forcing input for the model
//
// The splitter sits beside the pipeline: it carves a validation
// set out of the corpus and reorders pairs between epochs.

/// Reads aligned parallel text files, plus the built-in sample corpus
pub mod loader;

/// Cleans and whitespace-tokenises raw sentences
pub mod preprocessor;

/// Groups encoded pairs into padded, token-budget-bounded batches
pub mod batcher;

/// Seeded shuffling and train/validation splitting
pub mod splitter;
