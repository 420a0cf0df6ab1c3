//! Error types for the forecasting and dosing core

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Core error type
///
/// Every variant is surfaced to callers as a structured result value
/// (see [`ErrorKind`]) rather than propagated as a failure of the call itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Input history shorter than the model window
    #[error("Insufficient history: need at least {required} readings, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    /// A required artifact is missing or could not be parsed
    #[error("Artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    /// Unexpected failure while scaling or running inference
    #[error("Unexpected prediction error: {0}")]
    InternalPrediction(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            EngineError::ArtifactUnavailable(_) => ErrorKind::ArtifactUnavailable,
            EngineError::InternalPrediction(_) => ErrorKind::InternalPredictionFailure,
        }
    }

    /// Normalize an internal `anyhow` failure into a prediction error
    pub(crate) fn internal(err: anyhow::Error) -> Self {
        EngineError::InternalPrediction(format!("{:#}", err))
    }
}

/// Run an opaque model call, turning errors and panics into prediction errors
pub(crate) fn guard_inference<T, F>(call: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    panic::catch_unwind(AssertUnwindSafe(call))
        .map_err(|payload| EngineError::InternalPrediction(panic_message(payload.as_ref())))?
        .map_err(EngineError::internal)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("model panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("model panicked: {}", msg)
    } else {
        "model panicked".to_string()
    }
}

/// Serializable discriminant of [`EngineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientHistory,
    ArtifactUnavailable,
    InternalPredictionFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InsufficientHistory => "insufficient_history",
            ErrorKind::ArtifactUnavailable => "artifact_unavailable",
            ErrorKind::InternalPredictionFailure => "internal_prediction_failure",
        }
    }
}
