//! Error types for Pacekit

use thiserror::Error;

/// Errors surfaced at the engine's boundaries.
///
/// Sensor noise never produces an error: out-of-range numeric inputs are
/// clamped or defaulted inside the engine. These variants cover the
/// parse/persistence edges only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid store state: {0}")]
    StoreError(String),
}
