//! Store Error - failures reported synchronously to the caller

use std::io::Error as IoError;

/// Error returned by [`MetricsStore`](super::MetricsStore) operations.
///
/// A failed mutation leaves the stored state for that identity untouched.
#[derive(Debug)]
pub enum StoreError {
    /// A generated metric has label keys and values of different length
    MalformedMetric {
        family: String,
        index: usize,
        keys: usize,
        values: usize,
    },
    /// A generated metric repeats a label key
    DuplicateLabel {
        family: String,
        index: usize,
        label: String,
    },
    /// The generation transform returned a different number of families
    /// than the schema declares
    FamilyCountMismatch { expected: usize, actual: usize },
    /// Update or delete of an identity that is not stored
    UnknownIdentity(String),
    /// The render sink rejected a write
    Sink(IoError),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::MalformedMetric {
                family,
                index,
                keys,
                values,
            } => write!(
                f,
                "malformed metric #{} in family {}: {} label keys but {} label values",
                index, family, keys, values
            ),
            StoreError::DuplicateLabel { family, index, label } => write!(
                f,
                "metric #{} in family {} repeats label {}",
                index, family, label
            ),
            StoreError::FamilyCountMismatch { expected, actual } => {
                write!(f, "expected {} metric families, got {}", expected, actual)
            }
            StoreError::UnknownIdentity(identity) => write!(f, "unknown object identity: {}", identity),
            StoreError::Sink(e) => write!(f, "render sink error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for StoreError {
    fn from(e: IoError) -> Self {
        StoreError::Sink(e)
    }
}
