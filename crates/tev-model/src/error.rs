//! Error types for model configuration and evaluation.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Configuration error: {what}")]
    Config { what: String },

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Core(#[from] tev_core::CoreError),
}
