//! Family generators
//!
//! A [`FamilyGenerator`] owns the identity of one metric family and the
//! per-object transform that fills it. The transform never sets the name or
//! type: [`FamilyGenerator::generate`] stamps them afterwards, so a family's
//! declared identity and its emitted identity cannot drift apart.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::policy::FamilyFilter;
use crate::aggregation::{aggregated_metric_name, metric_header, Aggregation, AggregationSet};
use crate::metric::{Family, MetricType};

/// Per-object transform of one generator
pub type GenerateFn<O> = dyn Fn(&O) -> Family + Send + Sync;

/// All retained generators flattened into one transform, one family per
/// generator in generator order
pub type ComposedGenerateFn<O> = Arc<dyn Fn(&O) -> Vec<Family> + Send + Sync>;

/// Everything needed to generate one metric family from an object
pub struct FamilyGenerator<O> {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    generate_fn: Arc<GenerateFn<O>>,

    /// Aggregation name -> aggregation. An object's family may land in
    /// several rows of one aggregation, so aggregated sums need not match
    /// the raw sum. `None` once every aggregation has been filtered out.
    pub aggregate_by: Option<BTreeMap<String, Aggregation<O>>>,

    /// Raw family filtered out but at least one aggregation still enabled:
    /// the family is still generated, only its raw lines are not emitted.
    pub aggregations_only: bool,
}

impl<O> Clone for FamilyGenerator<O> {
    fn clone(&self) -> Self {
        FamilyGenerator {
            name: self.name.clone(),
            help: self.help.clone(),
            metric_type: self.metric_type,
            generate_fn: self.generate_fn.clone(),
            aggregate_by: self.aggregate_by.clone(),
            aggregations_only: self.aggregations_only,
        }
    }
}

impl<O> fmt::Debug for FamilyGenerator<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FamilyGenerator")
            .field("name", &self.name)
            .field("metric_type", &self.metric_type)
            .field(
                "aggregate_by",
                &self.aggregate_by.as_ref().map(|a| a.keys().collect::<Vec<_>>()),
            )
            .field("aggregations_only", &self.aggregations_only)
            .finish_non_exhaustive()
    }
}

impl<O> FamilyGenerator<O> {
    pub fn new<F>(name: impl Into<String>, help: impl Into<String>, metric_type: MetricType, generate: F) -> Self
    where
        F: Fn(&O) -> Family + Send + Sync + 'static,
    {
        FamilyGenerator {
            name: name.into(),
            help: help.into(),
            metric_type,
            generate_fn: Arc::new(generate),
            aggregate_by: None,
            aggregations_only: false,
        }
    }

    /// Attach a named aggregation
    pub fn with_aggregation(mut self, name: impl Into<String>, aggregation: Aggregation<O>) -> Self {
        self.aggregate_by
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), aggregation);
        self
    }

    /// Run the transform and stamp this generator's identity on the result
    pub fn generate(&self, obj: &O) -> Family {
        let mut family = (self.generate_fn)(obj);
        family.name.clone_from(&self.name);
        family.help.clone_from(&self.help);
        family.metric_type = self.metric_type;
        family
    }

    /// `# HELP` / `# TYPE` block, without trailing newline
    pub fn header(&self) -> String {
        metric_header(&self.name, &self.help, self.metric_type)
    }

    /// Aggregation name -> derived metric name, for every attached aggregation
    pub fn aggregated_metric_names(&self) -> BTreeMap<String, String> {
        self.aggregate_by
            .iter()
            .flat_map(|aggs| aggs.keys())
            .map(|agg_name| (agg_name.clone(), aggregated_metric_name(&self.name, agg_name)))
            .collect()
    }

    /// Apply `policy` to this generator and its aggregations
    ///
    /// Returns whether the generator is still needed: its raw family is
    /// included, or at least one aggregation survived.
    pub fn filter_aggregations<F: FamilyFilter + ?Sized>(&mut self, policy: &F) -> bool {
        if policy.is_excluded(&self.name) {
            // Still needed as input if an aggregation survives
            self.aggregations_only = true;
        }

        for (agg_name, metric_name) in self.aggregated_metric_names() {
            if policy.is_excluded(&metric_name) {
                if let Some(aggs) = self.aggregate_by.as_mut() {
                    aggs.remove(&agg_name);
                }
            }
        }
        if self.aggregate_by.as_ref().is_some_and(BTreeMap::is_empty) {
            self.aggregate_by = None;
        }

        !self.aggregations_only || self.aggregate_by.is_some()
    }

    /// The surviving aggregations bound to this generator's identity
    pub fn aggregation_set(&self) -> Option<AggregationSet<O>> {
        self.aggregate_by
            .as_ref()
            .map(|aggs| AggregationSet::new(aggs.clone(), self.name.clone(), self.help.clone(), self.metric_type))
    }
}

/// Filter generators through `policy`, taking aggregations into account
pub fn filter_metric_families<O, F>(policy: &F, generators: Vec<FamilyGenerator<O>>) -> Vec<FamilyGenerator<O>>
where
    F: FamilyFilter + ?Sized,
{
    let total = generators.len();
    let filtered: Vec<FamilyGenerator<O>> = generators
        .into_iter()
        .filter_map(|mut generator| {
            if generator.filter_aggregations(policy) {
                Some(generator)
            } else {
                debug!(family = %generator.name, "family filtered out");
                None
            }
        })
        .collect();

    info!(
        retained = filtered.len(),
        dropped = total - filtered.len(),
        aggregations_only = filtered.iter().filter(|g| g.aggregations_only).count(),
        "filtered metric families"
    );

    filtered
}

/// Header block of every generator, in generator order
pub fn extract_metric_family_headers<O>(generators: &[FamilyGenerator<O>]) -> Vec<String> {
    generators.iter().map(FamilyGenerator::header).collect()
}

/// Flatten generators into one per-object transform
pub fn compose_metric_gen_funcs<O: 'static>(generators: Vec<FamilyGenerator<O>>) -> ComposedGenerateFn<O> {
    Arc::new(move |obj: &O| generators.iter().map(|g| g.generate(obj)).collect())
}
