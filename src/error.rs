//! Compiler error types.
//!
//! The compiler recognises exactly three fatal error kinds; none
//! are recoverable locally, so every fallible entry point simply propagates
//! a [`CompileError`] with `?`.

use thiserror::Error;

/// A fatal error raised while lowering the IR to bytecode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A node that should never appear at compile time (a bare
    /// undefined-value expression standing where a value was required, or
    /// an unrecognised node subclass).
    #[error("malformed IR: {0}")]
    MalformedIr(String),

    /// An operator that has no lowering in the expression/condition switch.
    #[error("unsupported intrinsic: {0}")]
    UnsupportedIntrinsic(String),

    /// The index-analysis oracle returned no index matching the requested
    /// search signature.
    #[error("no index on relation '{relation}' matches signature {signature:#b}")]
    MissingIndex {
        /// Name of the relation the search signature was computed against.
        relation: String,
        /// The bound/free column bitmask that had no matching index.
        signature: u64,
    },
}

/// Convenience alias used throughout the compiler.
pub type Result<T> = std::result::Result<T, CompileError>;
