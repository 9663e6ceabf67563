//! Defines common error types for the Evogen core library.

use thiserror::Error;

/// Failures triggered by the class under test's own behavior.
///
/// These are expected during search: a generated test may well dereference
/// null or index past the end of an array. They are always wrapped into this
/// kind and propagated to the execution engine, which records them as part
/// of the test's observed behavior instead of failing generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeUnderTestError {
    /// A null value was dereferenced (array access or field access).
    #[error("null dereference")]
    NullDereference,

    /// An array index was outside the bounds of the array.
    #[error("array index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The length of the array that was accessed.
        length: usize,
    },

    /// A null value was written into a slot with a primitive component type.
    #[error("null value written to a primitive array slot")]
    NullIntoPrimitiveSlot,

    /// A value of the wrong shape reached a typed location.
    #[error("value of type {actual} is not usable where {expected} is expected")]
    TypeMismatch {
        /// Human-readable expected type.
        expected: String,
        /// Human-readable actual type.
        actual: String,
    },

    /// Class initialization failed while the test was touching the class.
    #[error("class initializer failed: {0}")]
    InitializerFailure(String),
}

/// The primary error type for Evogen operations.
#[derive(Error, Debug)]
pub enum EvogenError {
    /// A recoverable failure caused by the class under test itself.
    #[error("code under test raised: {0}")]
    CodeUnderTest(#[from] CodeUnderTestError),

    /// The framework attempted a field access it should always have rights
    /// to. This signals a corrupted run, not a property of the class under
    /// test, and is logged at error severity where it is raised.
    #[error("field {field} is not accessible to the framework")]
    InaccessibleField {
        /// Qualified name of the field.
        field: String,
    },

    /// A structural rewrite of a test case could not be completed.
    #[error("construction failed: {0}")]
    ConstructionFailed(String),

    /// Error related to configuration loading or validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Error during serialization or deserialization (e.g., JSON parsing).
    #[error("serialization/deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Represents an unexpected internal error.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl EvogenError {
    /// Whether this error is attributable to the class under test rather
    /// than to the framework.
    pub fn is_code_under_test(&self) -> bool {
        matches!(self, EvogenError::CodeUnderTest(_))
    }
}
