//! Aggregation strategies
//!
//! An aggregation turns one object's family into derived label rows. The
//! store emits each row as its own line; summing rows that share a label
//! set is left to whoever reads the exposition.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::error::AggregationError;
use super::labels::{get_labels_by_name, NONE_LABEL};
use crate::metric::Family;
use crate::object::Object;

/// Fixed leading labels of [`by_namespace_and_owner`]
pub const OWNER_LABELS: [&str; 4] = ["namespace", "owner_kind", "owner_name", "owner_is_controller"];

/// One derived row: a value plus label values matching the aggregation's
/// declared label names
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedValue {
    pub value: f64,
    pub label_values: Vec<String>,
}

/// Transform from an object and one of its families to derived rows
pub type AggregateFn<O> =
    dyn Fn(&O, &Family) -> Result<Vec<AggregatedValue>, AggregationError> + Send + Sync;

/// Ordered output label names plus the transform producing rows for them
pub struct Aggregation<O> {
    label_names: Vec<String>,
    aggregate: Arc<AggregateFn<O>>,
}

impl<O> Aggregation<O> {
    pub fn new<F>(label_names: Vec<String>, aggregate: F) -> Self
    where
        F: Fn(&O, &Family) -> Result<Vec<AggregatedValue>, AggregationError> + Send + Sync + 'static,
    {
        Aggregation {
            label_names,
            aggregate: Arc::new(aggregate),
        }
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Derive rows for `family` of `obj`
    pub fn aggregate(&self, obj: &O, family: &Family) -> Result<Vec<AggregatedValue>, AggregationError> {
        (self.aggregate)(obj, family)
    }
}

impl<O> Clone for Aggregation<O> {
    fn clone(&self) -> Self {
        Aggregation {
            label_names: self.label_names.clone(),
            aggregate: self.aggregate.clone(),
        }
    }
}

impl<O> fmt::Debug for Aggregation<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregation")
            .field("label_names", &self.label_names)
            .finish_non_exhaustive()
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Requested label names, first occurrence kept, minus any in `reserved`
///
/// Output label names must be unique within a line.
fn projected_names(names: &[&str], reserved: &[&str]) -> Vec<String> {
    let mut projected: Vec<String> = Vec::with_capacity(names.len());
    for &name in names {
        if reserved.contains(&name) || projected.iter().any(|p| p == name) {
            warn!(label = name, "duplicate aggregation label dropped");
            continue;
        }
        projected.push(name.to_string());
    }
    projected
}

/// One row per source metric, labelled by the projected `names`
pub fn by_labels<O: 'static>(names: &[&str]) -> Aggregation<O> {
    let projected = projected_names(names, &[]);
    Aggregation::new(projected.clone(), move |_obj: &O, family: &Family| {
        Ok(family
            .metrics
            .iter()
            .map(|m| AggregatedValue {
                value: m.value,
                label_values: get_labels_by_name(m, &projected),
            })
            .collect())
    })
}

/// Rows labelled by namespace and owner, followed by the projected `names`
///
/// Every source metric is replicated across every owner reference, so an
/// object with several owners contributes its value several times. An
/// object without owners contributes one row with `<none>` owner labels.
/// Requested names that repeat one of [`OWNER_LABELS`] are dropped.
pub fn by_namespace_and_owner<O: Object + 'static>(names: &[&str]) -> Aggregation<O> {
    let projected = projected_names(names, &OWNER_LABELS);
    let mut label_names = owned(&OWNER_LABELS);
    label_names.extend(projected.iter().cloned());

    Aggregation::new(label_names, move |obj: &O, family: &Family| {
        let meta = obj.meta().ok_or(AggregationError::MissingCapability {
            capability: "object metadata",
        })?;
        let namespace = meta.namespace.as_str();

        let owner_rows: Vec<[&str; 4]> = if meta.owner_references.is_empty() {
            vec![[namespace, NONE_LABEL, NONE_LABEL, NONE_LABEL]]
        } else {
            meta.owner_references
                .iter()
                .map(|owner| {
                    [
                        namespace,
                        owner.kind_label(),
                        owner.name_label(),
                        owner.controller_label(),
                    ]
                })
                .collect()
        };

        let mut aggregated = Vec::with_capacity(family.metrics.len() * owner_rows.len());
        for metric in &family.metrics {
            let tail = get_labels_by_name(metric, &projected);
            for row in &owner_rows {
                let mut label_values: Vec<String> = row.iter().map(|s| s.to_string()).collect();
                label_values.extend(tail.iter().cloned());
                aggregated.push(AggregatedValue {
                    value: metric.value,
                    label_values,
                });
            }
        }

        Ok(aggregated)
    })
}
