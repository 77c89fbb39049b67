//! Core metric types produced by family generators

use serde::{Deserialize, Serialize};
use std::fmt;

use super::exposition::{escape_label_value, format_value};

/// Type of a metric family, as declared in the `# TYPE` header line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Monotonically increasing value
    Counter,

    /// Point-in-time value
    #[default]
    Gauge,

    /// Bucketed distribution
    Histogram,

    /// Quantile distribution
    Summary,
}

impl MetricType {
    /// Exposition-format name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
        }
    }

    /// Parse an exposition-format type name
    pub fn parse(s: &str) -> Option<MetricType> {
        match s {
            "counter" => Some(MetricType::Counter),
            "gauge" => Some(MetricType::Gauge),
            "histogram" => Some(MetricType::Histogram),
            "summary" => Some(MetricType::Summary),
            _ => None,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One label set plus a numeric sample
///
/// `label_keys` and `label_values` are parallel sequences. A metric whose
/// sequences differ in length, or that repeats a key, is rejected by the
/// store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metric {
    pub label_keys: Vec<String>,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Metric {
    pub fn new<K, V>(label_keys: K, label_values: V, value: f64) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Metric {
            label_keys: label_keys.into_iter().map(Into::into).collect(),
            label_values: label_values.into_iter().map(Into::into).collect(),
            value,
        }
    }

    /// Metric without labels
    pub fn unlabeled(value: f64) -> Self {
        Metric {
            label_keys: Vec::new(),
            label_values: Vec::new(),
            value,
        }
    }

    /// Whether keys and values line up
    pub fn is_well_formed(&self) -> bool {
        self.label_keys.len() == self.label_values.len()
    }

    /// First label key that appears more than once
    pub fn duplicate_key(&self) -> Option<&str> {
        self.label_keys
            .iter()
            .enumerate()
            .find(|&(i, key)| self.label_keys[..i].contains(key))
            .map(|(_, key)| key.as_str())
    }

    /// Append this metric as a single exposition line under `name`
    pub fn write_line(&self, name: &str, out: &mut String) {
        write_sample(
            name,
            self.label_keys.iter().map(String::as_str),
            self.label_values.iter().map(String::as_str),
            self.value,
            out,
        );
    }
}

/// Render `name{k1="v1",...} value\n` into `out`
pub(crate) fn write_sample<'a, K, V>(name: &str, keys: K, values: V, value: f64, out: &mut String)
where
    K: IntoIterator<Item = &'a str>,
    V: IntoIterator<Item = &'a str>,
{
    out.push_str(name);
    let mut labels = keys.into_iter().zip(values).peekable();
    if labels.peek().is_some() {
        out.push('{');
        let mut first = true;
        for (key, label_value) in labels {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_label_value(label_value));
            out.push('"');
        }
        out.push('}');
    }
    out.push(' ');
    out.push_str(&format_value(value));
    out.push('\n');
}

/// A named, typed group of metrics sharing one help text
///
/// Per-object generation transforms only fill in `metrics`. The owning
/// `FamilyGenerator` stamps `name`, `help` and `metric_type` afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Family {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub metrics: Vec<Metric>,
}

impl Family {
    /// Family carrying only metrics, as returned by a generation transform
    pub fn new(metrics: Vec<Metric>) -> Self {
        Family {
            metrics,
            ..Default::default()
        }
    }

    /// Empty family (object produced nothing for this generator)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Position of the first metric whose keys and values differ in length
    pub fn first_malformed(&self) -> Option<usize> {
        self.metrics.iter().position(|m| !m.is_well_formed())
    }

    /// Position and key of the first metric repeating a label key
    pub fn first_duplicate_key(&self) -> Option<(usize, &str)> {
        self.metrics
            .iter()
            .enumerate()
            .find_map(|(i, m)| m.duplicate_key().map(|key| (i, key)))
    }

    /// Render all metric lines of this family (no header)
    pub fn render(&self) -> String {
        let mut out = String::new();
        for metric in &self.metrics {
            metric.write_line(&self.name, &mut out);
        }
        out
    }
}
