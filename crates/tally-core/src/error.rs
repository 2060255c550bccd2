//! Error types for canonical encoding

use thiserror::Error;

/// Failure while producing the canonical byte form of a value.
///
/// Canonical encoding goes through `serde_json`, which can reject values
/// that have no JSON representation (non-string map keys, non-finite
/// floats). Domain types in this crate always encode cleanly; the error
/// surfaces misuse rather than data corruption.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized into canonical JSON.
    #[error("canonical encoding failed: {message}")]
    Encoding {
        /// Underlying serializer message.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding error with the given message.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::encoding(err.to_string())
    }
}
