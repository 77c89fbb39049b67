//! Store schema
//!
//! The immutable configuration a [`MetricsStore`](super::MetricsStore) is
//! built from: per-generator headers, the composed generation transform,
//! the aggregations-only flags and the surviving aggregation sets. It is
//! assembled once at startup and passed to the store explicitly.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use super::error::StoreError;
use crate::aggregation::AggregationSet;
use crate::generator::{
    compose_metric_gen_funcs, extract_metric_family_headers, filter_metric_families, ComposedGenerateFn,
    FamilyFilter, FamilyGenerator,
};
use crate::metric::Family;

pub struct StoreSchema<O> {
    headers: Vec<String>,
    generate: ComposedGenerateFn<O>,
    aggregations_only: Vec<bool>,
    aggregation_sets: Vec<Option<AggregationSet<O>>>,
    /// Metric names claimed by more than one header block
    name_collisions: Vec<String>,
    /// Reserved; 0 means unsharded
    shard_hint: u32,
}

/// Metric name of a `# HELP <name> ...` header block
fn header_metric_name(header: &str) -> &str {
    header
        .strip_prefix("# HELP ")
        .and_then(|rest| rest.split(' ').next())
        .unwrap_or(header)
}

/// Names emitted by more than one header block, warned about once each
fn find_name_collisions<O>(headers: &[String], aggregation_sets: &[Option<AggregationSet<O>>]) -> Vec<String> {
    let names = headers.iter().map(|h| header_metric_name(h)).chain(
        aggregation_sets
            .iter()
            .flatten()
            .flat_map(|set| set.metric_names()),
    );

    let mut seen = BTreeSet::new();
    let mut collisions = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            collisions.insert(name.to_string());
        }
    }

    for name in &collisions {
        warn!(metric = %name, "metric name emitted by more than one family");
    }
    collisions.into_iter().collect()
}

impl<O> Clone for StoreSchema<O> {
    fn clone(&self) -> Self {
        StoreSchema {
            headers: self.headers.clone(),
            generate: self.generate.clone(),
            aggregations_only: self.aggregations_only.clone(),
            aggregation_sets: self.aggregation_sets.clone(),
            name_collisions: self.name_collisions.clone(),
            shard_hint: self.shard_hint,
        }
    }
}

impl<O> std::fmt::Debug for StoreSchema<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSchema")
            .field("families", &self.headers.len())
            .field("aggregations_only", &self.aggregations_only)
            .field(
                "aggregations",
                &self
                    .aggregation_sets
                    .iter()
                    .map(|s| s.as_ref().map_or(0, AggregationSet::len))
                    .collect::<Vec<_>>(),
            )
            .field("name_collisions", &self.name_collisions)
            .field("shard_hint", &self.shard_hint)
            .finish()
    }
}

impl<O: 'static> StoreSchema<O> {
    /// Schema from an already filtered generator list
    pub fn from_generators(generators: Vec<FamilyGenerator<O>>) -> Self {
        let headers = extract_metric_family_headers(&generators);
        let aggregations_only = generators.iter().map(|g| g.aggregations_only).collect();
        let aggregation_sets: Vec<_> = generators.iter().map(FamilyGenerator::aggregation_set).collect();
        let name_collisions = find_name_collisions(&headers, &aggregation_sets);

        StoreSchema {
            headers,
            generate: compose_metric_gen_funcs(generators),
            aggregations_only,
            aggregation_sets,
            name_collisions,
            shard_hint: 0,
        }
    }

    /// Filter `generators` through `policy`, then build the schema
    pub fn filtered<F: FamilyFilter + ?Sized>(policy: &F, generators: Vec<FamilyGenerator<O>>) -> Self {
        Self::from_generators(filter_metric_families(policy, generators))
    }
}

impl<O> StoreSchema<O> {
    /// Schema from hand-assembled parts
    ///
    /// `aggregation_sets` is keyed by generator position. The transform must
    /// return one family per header.
    pub fn new(
        headers: Vec<String>,
        generate: ComposedGenerateFn<O>,
        aggregations_only: Vec<bool>,
        mut aggregation_sets: BTreeMap<usize, AggregationSet<O>>,
    ) -> Result<Self, StoreError> {
        if aggregations_only.len() != headers.len() {
            return Err(StoreError::FamilyCountMismatch {
                expected: headers.len(),
                actual: aggregations_only.len(),
            });
        }
        if let Some((&index, _)) = aggregation_sets.range(headers.len()..).next() {
            return Err(StoreError::FamilyCountMismatch {
                expected: headers.len(),
                actual: index + 1,
            });
        }

        let aggregation_sets: Vec<_> = (0..headers.len())
            .map(|i| aggregation_sets.remove(&i).filter(|set| !set.is_empty()))
            .collect();
        let name_collisions = find_name_collisions(&headers, &aggregation_sets);

        Ok(StoreSchema {
            headers,
            generate,
            aggregations_only,
            aggregation_sets,
            name_collisions,
            shard_hint: 0,
        })
    }

    pub fn with_shard_hint(mut self, shard_hint: u32) -> Self {
        self.shard_hint = shard_hint;
        self
    }

    pub fn shard_hint(&self) -> u32 {
        self.shard_hint
    }

    /// Number of families the transform produces per object
    pub fn family_count(&self) -> usize {
        self.headers.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn aggregations_only(&self, index: usize) -> bool {
        self.aggregations_only.get(index).copied().unwrap_or(false)
    }

    /// Metric names more than one family would write a header for
    ///
    /// Non-empty means the exposition repeats those header blocks.
    pub fn name_collisions(&self) -> &[String] {
        &self.name_collisions
    }

    pub fn aggregation_set(&self, index: usize) -> Option<&AggregationSet<O>> {
        self.aggregation_sets.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn generate(&self, obj: &O) -> Vec<Family> {
        (self.generate)(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::by_labels;
    use crate::generator::AllowDenyList;
    use crate::metric::{Metric, MetricType};
    use crate::object::ObjectMeta;
    use std::sync::Arc;

    fn generators() -> Vec<FamilyGenerator<ObjectMeta>> {
        vec![
            FamilyGenerator::new("kube_a", "A.", MetricType::Gauge, |_: &ObjectMeta| {
                Family::new(vec![Metric::new(["k"], ["v"], 1.0)])
            })
            .with_aggregation("k", by_labels(&["k"])),
            FamilyGenerator::new("kube_b", "B.", MetricType::Counter, |_: &ObjectMeta| Family::empty()),
        ]
    }

    #[test]
    fn test_from_generators() {
        let schema = StoreSchema::from_generators(generators());
        assert_eq!(schema.family_count(), 2);
        assert!(schema.aggregation_set(0).is_some());
        assert!(schema.aggregation_set(1).is_none());
        assert!(!schema.aggregations_only(0));
        assert_eq!(schema.shard_hint(), 0);
    }

    #[test]
    fn test_filtered() {
        let policy = AllowDenyList::denylist(["kube_a", "kube_b"]).unwrap();
        let schema = StoreSchema::filtered(&policy, generators()).with_shard_hint(3);
        assert_eq!(schema.family_count(), 1);
        assert!(schema.aggregations_only(0));
        assert_eq!(schema.shard_hint(), 3);
    }

    #[test]
    fn test_name_collisions() {
        assert!(StoreSchema::from_generators(generators()).name_collisions().is_empty());

        let mut clashing = generators();
        clashing.push(FamilyGenerator::new("kube_a_by_k", "Clash.", MetricType::Gauge, |_: &ObjectMeta| {
            Family::empty()
        }));
        clashing.push(FamilyGenerator::new("kube_b", "Again.", MetricType::Gauge, |_: &ObjectMeta| {
            Family::empty()
        }));
        let schema = StoreSchema::from_generators(clashing);
        assert_eq!(schema.name_collisions(), ["kube_a_by_k", "kube_b"]);
    }

    #[test]
    fn test_header_metric_name() {
        assert_eq!(header_metric_name("# HELP kube_a A.\n# TYPE kube_a gauge"), "kube_a");
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let generate: ComposedGenerateFn<ObjectMeta> = Arc::new(|_: &ObjectMeta| vec![Family::empty()]);
        let err = StoreSchema::new(vec!["# HELP x".to_string()], generate, vec![], BTreeMap::new()).unwrap_err();
        assert!(matches!(err, StoreError::FamilyCountMismatch { expected: 1, actual: 0 }));
    }

    #[test]
    fn test_new_rejects_out_of_range_set() {
        let generate: ComposedGenerateFn<ObjectMeta> = Arc::new(|_: &ObjectMeta| vec![Family::empty()]);
        let mut sets = BTreeMap::new();
        sets.insert(
            4,
            AggregationSet::new(BTreeMap::new(), "x", "X.", MetricType::Gauge),
        );
        let err = StoreSchema::new(vec!["h".to_string()], generate, vec![false], sets).unwrap_err();
        assert!(matches!(err, StoreError::FamilyCountMismatch { expected: 1, actual: 5 }));
    }
}
