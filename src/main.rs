//! Render metrics for a snapshot of objects
//!
//! Reads a JSON array of objects (from the file given as the first argument,
//! or stdin), stores each one under its `metadata.uid` (falling back to
//! `namespace/name`), and writes the exposition to stdout.
//!
//! Configuration comes from `STATE_METRICS_CONFIG` (a TOML file) when set,
//! otherwise from `STATE_METRICS_*` environment variables.

use std::io::Read;

use serde_json::Value;
use state_metrics::aggregation::by_labels;
use state_metrics::observability::init_tracing;
use state_metrics::{
    by_namespace_and_owner, Family, FamilyGenerator, Metric, MetricType, MetricsConfig, MetricsStore, Object,
    StoreSchema,
};
use tracing::{info, warn};

fn str_field<'a>(obj: &'a Value, pointer: &str) -> &'a str {
    obj.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

fn generators() -> Vec<FamilyGenerator<Value>> {
    vec![
        FamilyGenerator::new(
            "state_object_info",
            "Information about a watched object.",
            MetricType::Gauge,
            |obj: &Value| {
                Family::new(vec![Metric::new(
                    ["namespace", "name", "uid", "kind"],
                    [
                        str_field(obj, "/metadata/namespace"),
                        str_field(obj, "/metadata/name"),
                        str_field(obj, "/metadata/uid"),
                        str_field(obj, "/kind"),
                    ],
                    1.0,
                )])
            },
        )
        .with_aggregation("kind", by_labels(&["kind"]))
        .with_aggregation("owner", by_namespace_and_owner(&["kind"])),
        FamilyGenerator::new(
            "state_object_owner_references",
            "Number of owner references of a watched object.",
            MetricType::Gauge,
            |obj: &Value| {
                let owners = obj.meta().map_or(0, |m| m.owner_references.len());
                Family::new(vec![Metric::new(
                    ["namespace", "name"],
                    [str_field(obj, "/metadata/namespace"), str_field(obj, "/metadata/name")],
                    owners as f64,
                )])
            },
        ),
    ]
}

fn identity(obj: &Value) -> String {
    let uid = str_field(obj, "/metadata/uid");
    if uid.is_empty() {
        format!("{}/{}", str_field(obj, "/metadata/namespace"), str_field(obj, "/metadata/name"))
    } else {
        uid.to_string()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var("STATE_METRICS_CONFIG") {
        Ok(path) => MetricsConfig::from_file(path)?,
        Err(_) => MetricsConfig::from_env(),
    };

    init_tracing(&config.log)?;

    let input = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let objects: Vec<Value> = serde_json::from_str(&input)?;

    let policy = config.family_filter()?;
    let schema = StoreSchema::filtered(&policy, generators()).with_shard_hint(config.shard_hint);
    let store = MetricsStore::new(schema);

    store.replace(objects.iter().map(|obj| (identity(obj), obj)))?;
    if store.len() < objects.len() {
        warn!(objects = objects.len(), stored = store.len(), "duplicate identities collapsed");
    }
    info!(objects = store.len(), "snapshot loaded");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    store.write_all(&mut out)?;

    Ok(())
}
