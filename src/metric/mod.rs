//! Metric data model
//!
//! - [`Metric`]: one label set plus a numeric sample
//! - [`Family`]: a named, typed group of metrics sharing one help text
//! - exposition helpers for the pull-based text format

mod exposition;
mod types;

pub use exposition::{escape_help, escape_label_value, format_value};
pub use types::{Family, Metric, MetricType};

pub(crate) use types::write_sample;
