// ============================================================
// nmt-seq2seq
// ============================================================
// Attention-based encoder–decoder neural machine translation on
// Burn, laid out in layers:
//
//   Layer 1  cli          - clap commands (train / translate)
//   Layer 2  application  - use cases that wire everything together
//   Layer 3  domain       - vocabularies, sentence pairs, core traits
//   Layer 4  data         - corpus loading, batching, splitting
//   Layer 5  ml           - the network, training loop and search
//   Layer 6  infra        - model artifacts and metrics on disk
//
// Library code returns error::Result; the top two layers use anyhow.

#![recursion_limit = "256"]

pub mod error;

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;

pub use error::{NmtError, Result};
