//! Error type shared by every engine operation.

use thiserror::Error;

/// Failures reported by the engine. Each failing call leaves the grid,
/// parameters and interop state as they were before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Device allocation failed. Retrying at a smaller size or later may succeed.
    #[error("Out of device memory: requested {requested_bytes} bytes ({reason})")]
    OutOfMemory { requested_bytes: usize, reason: String },

    /// Preset id not present in the catalog.
    #[error("Unknown preset id {0}")]
    UnknownPreset(i32),

    /// Operation called before `init` (or after `shutdown`).
    #[error("Engine is not initialized")]
    NotInitialized,

    /// Grid dimensions must both be non-zero.
    #[error("Invalid grid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// The pixel buffer could not be bound to the engine.
    #[error("Interop registration failed: {0}")]
    InteropRegistrationFailed(String),

    /// The registered pixel buffer could not be mapped, written or unmapped.
    #[error("Interop map failed: {0}")]
    MapFailed(String),

    /// Broken internal precondition (mismatched buffer sizes and the like).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn out_of_memory(requested_bytes: usize, reason: impl Into<String>) -> Self {
        EngineError::OutOfMemory { requested_bytes, reason: reason.into() }
    }

    pub fn registration(message: impl Into<String>) -> Self {
        EngineError::InteropRegistrationFailed(message.into())
    }

    pub fn map_failed(message: impl Into<String>) -> Self {
        EngineError::MapFailed(message.into())
    }

    /// True for the interop failures a caller may retry on the next tick.
    pub fn is_interop(&self) -> bool {
        matches!(self, EngineError::InteropRegistrationFailed(_) | EngineError::MapFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

