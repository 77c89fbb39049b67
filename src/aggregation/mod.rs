//! Derived Metric Aggregation
//!
//! Groups raw per-object metrics along computed label dimensions without
//! regenerating the raw data:
//!
//! - **Label projection** ([`get_labels_by_name`]): single forward pass,
//!   always as many values as names requested
//! - **Strategies**: [`by_labels`] (one row per metric) and
//!   [`by_namespace_and_owner`] (metrics x owner references fan-out)
//! - **Sets** ([`AggregationSet`]): named aggregations under one family
//!   identity, each with a collision-free output name

mod aggregators;
mod error;
mod labels;
mod set;

pub use aggregators::{by_labels, by_namespace_and_owner, AggregateFn, AggregatedValue, Aggregation, OWNER_LABELS};
pub use error::AggregationError;
pub use labels::{get_labels_by_name, NONE_LABEL};
pub use set::{
    aggregated_metric_name, aggregated_metric_name_suffix, metric_header, AggregationEntry, AggregationSet,
};
