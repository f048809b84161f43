//! Error types for the Lattice engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for Lattice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the type-aggregation engine
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Mutation attempted on a sealed object (programmer error: the
    /// build/seal discipline was violated)
    #[error("Cannot mutate sealed {0}")]
    SealedMutation(&'static str),

    /// Operation requires a sealed (fully resolved) object
    #[error("{0} is not sealed yet")]
    NotSealed(&'static str),

    /// Repository access failed during a snapshot load
    #[error("Repository access failed: {0}")]
    Repository(String),

    /// A named type could not be found
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// A declared field type alias names no known primitive kind
    #[error("Unknown property kind: {0}")]
    UnknownPropertyKind(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
