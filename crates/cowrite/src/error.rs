//! Error types for the OT core.

use thiserror::Error;

use crate::operation::OpKind;

/// Result type alias for OT core operations.
pub type OtResult<T> = Result<T, OtError>;

/// Errors produced by validation, application, and transformation.
///
/// Transport and backpressure failures are not represented here; the hub
/// logs and contains them instead of surfacing them to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtError {
    /// Operation failed validation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Position falls outside the document, or off a character boundary.
    #[error("{kind} position {position} out of range for document of length {doc_len}")]
    PositionOutOfRange {
        kind: OpKind,
        position: usize,
        doc_len: usize,
    },

    /// The text a delete expected to remove is not what the document holds.
    #[error("delete text mismatch at {position}: expected {expected:?}, found {found:?}")]
    DeleteTextMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    /// Transform has no rule for this pair of operation kinds.
    #[error("unsupported operation pair: {0} vs {1}")]
    UnsupportedPair(OpKind, OpKind),

    /// A message or operation could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}
