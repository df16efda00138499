// src/error.rs
//
// Error kinds raised by the conditioning and spectral stages.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElecPhysError {
    /// A parameter violates a stated invariant (cutoff at or above Nyquist,
    /// zero-variance channel, window longer than the record, empty crop...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A loaded record or spectral file lacks a field or has inconsistent shapes
    #[error("Format error: {0}")]
    Format(String),

    /// Numerically degenerate filter design or evaluation
    #[error("Computation error: {0}")]
    Computation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NPZ write error: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),
}

impl ElecPhysError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    pub fn is_computation(&self) -> bool {
        matches!(self, Self::Computation(_))
    }
}

pub type Result<T> = std::result::Result<T, ElecPhysError>;
