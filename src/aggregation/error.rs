//! Aggregation Error - contribution failures for a single object

/// Error returned by an aggregation transform for one object.
///
/// Only that aggregation's contribution for that object is lost; raw
/// metrics and other aggregations of the same object are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// The object does not expose the accessor the aggregation needs
    MissingCapability { capability: &'static str },
}

impl std::fmt::Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::MissingCapability { capability } => {
                write!(f, "object does not provide {}", capability)
            }
        }
    }
}

impl std::error::Error for AggregationError {}
