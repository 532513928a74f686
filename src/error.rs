//! Error types for join execution

use crate::tracking::FuelExceededError;
use thiserror::Error;

/// Join execution errors
#[derive(Error, Debug)]
pub enum JoinError {
    /// Operator not opened
    #[error("operator not opened - call open() before next()")]
    OperatorNotOpened,

    /// Operator already opened
    #[error("operator already opened")]
    OperatorAlreadyOpened,

    /// Operator is closed
    #[error("operator is closed")]
    OperatorClosed,

    /// A join key referenced variables that neither input advertises.
    ///
    /// This is a caller contract violation (the dispatcher derives keys from
    /// the input schemas, so a well-formed caller never hits it).
    #[error("malformed join key: {0}")]
    MalformedJoinKey(String),

    /// Fuel limit exceeded
    #[error(transparent)]
    FuelExceeded(#[from] FuelExceededError),

    /// Failure reported by an upstream row producer or condition evaluator.
    #[error("row source error: {0}")]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// Internal error (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for join operations
pub type Result<T> = std::result::Result<T, JoinError>;
