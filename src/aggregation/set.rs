//! Aggregation sets
//!
//! Groups named aggregations of one family under the family's identity.
//! Each aggregation gets its own output metric, named
//! `<family name><aggregated_metric_name_suffix(aggregation name)>`, so the
//! filtering policy can target aggregations one by one.

use std::collections::BTreeMap;

use super::aggregators::Aggregation;
use super::error::AggregationError;
use crate::metric::{escape_help, write_sample, Family, MetricType};

/// Suffix appended to a family name for the aggregation called `aggregation_name`
pub fn aggregated_metric_name_suffix(aggregation_name: &str) -> String {
    format!("_by_{}", aggregation_name)
}

/// Output metric name of an aggregation of `family_name`
pub fn aggregated_metric_name(family_name: &str, aggregation_name: &str) -> String {
    let mut name = String::with_capacity(family_name.len() + aggregation_name.len() + 4);
    name.push_str(family_name);
    name.push_str(&aggregated_metric_name_suffix(aggregation_name));
    name
}

/// `# HELP` / `# TYPE` block for a metric, without trailing newline
pub fn metric_header(name: &str, help: &str, metric_type: MetricType) -> String {
    let mut header = String::with_capacity(name.len() * 2 + help.len() + 24);
    header.push_str("# HELP ");
    header.push_str(name);
    header.push(' ');
    header.push_str(&escape_help(help));
    header.push('\n');
    header.push_str("# TYPE ");
    header.push_str(name);
    header.push(' ');
    header.push_str(metric_type.as_str());
    header
}

/// One aggregation of a set, with its derived identity
#[derive(Debug)]
pub struct AggregationEntry<O> {
    pub name: String,
    pub metric_name: String,
    pub header: String,
    pub aggregation: Aggregation<O>,
}

impl<O> Clone for AggregationEntry<O> {
    fn clone(&self) -> Self {
        AggregationEntry {
            name: self.name.clone(),
            metric_name: self.metric_name.clone(),
            header: self.header.clone(),
            aggregation: self.aggregation.clone(),
        }
    }
}

/// Named aggregations sharing one output identity
#[derive(Debug)]
pub struct AggregationSet<O> {
    name: String,
    help: String,
    metric_type: MetricType,
    /// Sorted by aggregation name
    entries: Vec<AggregationEntry<O>>,
}

impl<O> Clone for AggregationSet<O> {
    fn clone(&self) -> Self {
        AggregationSet {
            name: self.name.clone(),
            help: self.help.clone(),
            metric_type: self.metric_type,
            entries: self.entries.clone(),
        }
    }
}

impl<O> AggregationSet<O> {
    pub fn new(
        aggregations: BTreeMap<String, Aggregation<O>>,
        name: impl Into<String>,
        help: impl Into<String>,
        metric_type: MetricType,
    ) -> Self {
        let name = name.into();
        let help = help.into();
        let entries = aggregations
            .into_iter()
            .map(|(agg_name, aggregation)| {
                let metric_name = aggregated_metric_name(&name, &agg_name);
                let header = metric_header(&metric_name, &help, metric_type);
                AggregationEntry {
                    name: agg_name,
                    metric_name,
                    header,
                    aggregation,
                }
            })
            .collect();

        AggregationSet {
            name,
            help,
            metric_type,
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn entries(&self) -> &[AggregationEntry<O>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derived output metric names, in entry order
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.metric_name.as_str())
    }

    /// Render the rows each aggregation derives from `family` of `obj`
    ///
    /// Returns one result per entry, in entry order. A failed aggregation
    /// does not affect the others.
    pub fn render(&self, obj: &O, family: &Family) -> Vec<Result<String, AggregationError>> {
        self.entries
            .iter()
            .map(|entry| {
                let rows = entry.aggregation.aggregate(obj, family)?;
                let mut out = String::new();
                for row in &rows {
                    write_sample(
                        &entry.metric_name,
                        entry.aggregation.label_names().iter().map(String::as_str),
                        row.label_values.iter().map(String::as_str),
                        row.value,
                        &mut out,
                    );
                }
                Ok(out)
            })
            .collect()
    }
}
