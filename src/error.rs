//! Error types for responsive containers

use thiserror::Error;

/// Errors surfaced by keyed or indexed access on responsive containers.
///
/// None of these are retried internally; a failed operation leaves the
/// container untouched and emits no event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponsiveError {
    /// `remove` was asked for a value the sequence does not contain.
    #[error("value not found in sequence: {value}")]
    NotFound {
        /// Rendered form of the missing value.
        value: String,
    },
    /// Index outside `-len..len`.
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange {
        /// Index as given by the caller (may be negative).
        index: isize,
        /// Length of the sequence at the time of access.
        len: usize,
    },
    /// Record has no field with this name.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// Requested key.
        key: String,
    },
    /// Observer registration was attempted on a value that is not a
    /// responsive container.
    #[error("value is not a responsive container")]
    NotAContainer,
    /// A sequence wrapper was asked to replace its content with a non-sequence.
    #[error("expected a sequence value")]
    NotASequence,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ResponsiveError>;
