pub mod aggregation;
pub mod config;
pub mod generator;
pub mod metric;
pub mod object;
pub mod observability;
pub mod store;

#[cfg(test)]
mod stateright;

pub use aggregation::{by_labels, by_namespace_and_owner, Aggregation, AggregationError, AggregationSet};
pub use config::{ConfigError, LogConfig, MetricsConfig};
pub use generator::{filter_metric_families, AllowDenyList, FamilyFilter, FamilyGenerator};
pub use metric::{Family, Metric, MetricType};
pub use object::{Object, ObjectMeta, OwnerReference};
pub use store::{MetricsStore, StoreError, StoreSchema};
