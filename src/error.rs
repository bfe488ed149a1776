// ============================================================
// Crate Errors
// ============================================================
// Every library layer returns crate::error::Result.
// The CLI and application layers wrap these in anyhow
// with extra context; nothing below them does.
//
// Categories:
//   Config            - invalid hyperparameters, caught before training
//   Data              - empty corpus, nothing left after length filtering
//   IncompatibleModel - artifact does not match the expected architecture
//
// Non-finite losses are NOT errors. They are reported through the
// training progress callback exactly as computed.

use thiserror::Error;

/// Result alias used throughout the library layers.
pub type Result<T> = std::result::Result<T, NmtError>;

#[derive(Error, Debug)]
pub enum NmtError {
    /// Invalid or contradictory hyperparameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unusable training or inference data.
    #[error("data error: {0}")]
    Data(String),

    /// A persisted model that cannot be used with this build or config.
    #[error("incompatible model: {0}")]
    IncompatibleModel(String),

    /// Burn recorder failure while writing weights.
    #[error("recorder error: {0}")]
    Recorder(String),

    /// Tensor data could not be read back to the host.
    #[error("tensor readback error: {0}")]
    Tensor(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl NmtError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::IncompatibleModel(msg.into())
    }
}
