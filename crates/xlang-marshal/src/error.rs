//! Marshaling error types

use thiserror::Error;

use crate::property_value::PropertyType;

/// Construction argument errors
///
/// Raised while resolving host input (positional, named or map) against a
/// struct's field list, or while converting a host value to a field's kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// A field received no value
    #[error("{ty}: missing value for field {field}")]
    MissingField { ty: String, field: String },

    /// A field was bound more than once
    #[error("{ty}: field {field} given more than once")]
    Ambiguous { ty: String, field: String },

    /// A name matched no field
    #[error("{ty} has no field named {field}")]
    UnknownField { ty: String, field: String },

    /// More positional arguments than fields
    #[error("{ty} takes at most {max} arguments, {given} given")]
    TooManyArguments { ty: String, max: usize, given: usize },

    /// Integer does not fit the target width
    #[error("{field}: {value} is out of range for {kind}")]
    OutOfRange {
        field: String,
        value: String,
        kind: &'static str,
    },

    /// Host value of the wrong kind
    #[error("{field}: expected {expected}, got {actual}")]
    WrongKind {
        field: String,
        expected: String,
        actual: &'static str,
    },
}

/// Marshaling errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// Host input rejected
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// Boxed value read as a different type than it holds
    #[error("type mismatch: expected {expected}, value holds {actual}")]
    TypeMismatch {
        expected: PropertyType,
        actual: PropertyType,
    },

    /// Property type with no host representation
    #[error("unsupported property type {0}")]
    Unsupported(PropertyType),

    /// Buffer underflow - not enough data
    #[error("buffer underflow: needed {needed} bytes, have {have}")]
    BufferUnderflow { needed: usize, have: usize },

    /// Native layout does not match the struct definition
    #[error("layout error: {0}")]
    Layout(String),
}

/// Result type for marshaling operations
pub type Result<T> = std::result::Result<T, MarshalError>;
