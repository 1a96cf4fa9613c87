//! Error types for the RippleCut engine.

use thiserror::Error;

/// Engine-wide error type. Commands surface these through the dispatcher's
/// last-error channel; no variant name leaks into the command interface.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("not found: {0}")]
    EntityNotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("media boundary exceeded: {0}")]
    MediaBoundary(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("undo failure: {0}")]
    UndoFailure(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
