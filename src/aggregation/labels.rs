//! Label projection

use crate::metric::Metric;

/// Placeholder for a requested label the metric does not carry
pub const NONE_LABEL: &str = "<none>";

/// Project a metric's labels onto `names`
///
/// Always returns exactly `names.len()` values. The metric's keys are scanned
/// once, left to right, advancing through `names` only on an exact match.
/// `names` must therefore be ordered the same way the generating family
/// orders its keys: a name requested out of order, or one that never
/// matches, yields [`NONE_LABEL`].
pub fn get_labels_by_name<S: AsRef<str>>(metric: &Metric, names: &[S]) -> Vec<String> {
    let mut values = Vec::with_capacity(names.len());
    if names.is_empty() {
        return values;
    }

    let mut name_index = 0;
    for (key, value) in metric.label_keys.iter().zip(&metric.label_values) {
        if key == names[name_index].as_ref() {
            values.push(value.clone());
            name_index += 1;
            if name_index >= names.len() {
                break;
            }
        }
    }

    values.resize(names.len(), NONE_LABEL.to_string());
    values
}
