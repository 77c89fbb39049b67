//! Deterministic Simulation Testing for the MetricsStore
//!
//! Shadow-state testing harness that enables:
//! - Deterministic random add/update/delete/replace generation
//! - Full render checked against an independently computed expectation
//!   after every operation
//! - Seed-based reproducibility for debugging

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::error::StoreError;
use super::metrics_store::MetricsStore;
use super::schema::StoreSchema;
use crate::aggregation::{by_labels, by_namespace_and_owner};
use crate::generator::{AllowDenyList, FamilyGenerator};
use crate::metric::{escape_label_value, format_value, Family, Metric, MetricType};
use crate::object::{Object, ObjectMeta, OwnerReference};

const PHASES: [&str; 3] = ["Pending", "Running", "Succeeded"];
const OWNER_KINDS: [&str; 3] = ["ReplicaSet", "Job", "Node"];

/// Family names emitted by the harness schema, in generator order
const INFO: &str = "dst_object_info";
const VALUE: &str = "dst_object_value";

/// Configuration for store DST
#[derive(Debug, Clone)]
pub struct StoreDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of distinct identities
    pub num_identities: usize,
    /// Number of distinct namespaces
    pub num_namespaces: usize,
    /// Maximum owner references per object
    pub max_owners: usize,
    /// Probability of update operation
    pub update_prob: f64,
    /// Probability of delete operation
    pub delete_prob: f64,
    /// Probability of full relist
    pub replace_prob: f64,
    /// Probability a generated object yields a malformed metric
    pub malformed_prob: f64,
    /// Probability a generated object carries no metadata
    pub bare_prob: f64,
}

impl Default for StoreDSTConfig {
    fn default() -> Self {
        StoreDSTConfig {
            seed: 0,
            num_identities: 20,
            num_namespaces: 3,
            max_owners: 2,
            update_prob: 0.3,
            delete_prob: 0.2,
            replace_prob: 0.02,
            malformed_prob: 0.05,
            bare_prob: 0.05,
        }
    }
}

impl StoreDSTConfig {
    pub fn new(seed: u64) -> Self {
        StoreDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Few identities, lots of churn on each
    pub fn small_identities(seed: u64) -> Self {
        StoreDSTConfig {
            seed,
            num_identities: 4,
            delete_prob: 0.3,
            ..Default::default()
        }
    }

    /// Many owners per object (large fan-out)
    pub fn wide_owners(seed: u64) -> Self {
        StoreDSTConfig {
            seed,
            max_owners: 6,
            ..Default::default()
        }
    }

    /// Frequent generation failures and metadata-less objects
    pub fn faulty_objects(seed: u64) -> Self {
        StoreDSTConfig {
            seed,
            malformed_prob: 0.25,
            bare_prob: 0.25,
            replace_prob: 0.05,
            ..Default::default()
        }
    }
}

/// Object type driven through the harness
#[derive(Debug, Clone, PartialEq)]
pub struct DstObject {
    pub meta: Option<ObjectMeta>,
    pub phase: String,
    pub value: f64,
    /// Emit a metric with a missing label value
    pub malformed: bool,
}

impl Object for DstObject {
    fn meta(&self) -> Option<Cow<'_, ObjectMeta>> {
        self.meta.as_ref().map(Cow::Borrowed)
    }
}

/// Schema used by the harness
///
/// `dst_object_value` is denied raw, so it is kept for its aggregation only.
pub fn dst_schema() -> StoreSchema<DstObject> {
    let info = FamilyGenerator::new(INFO, "Object info.", MetricType::Gauge, |obj: &DstObject| {
        let uid = obj.meta.as_ref().map(|m| m.uid.as_str()).unwrap_or("");
        let mut metric = Metric::new(["uid", "phase"], [uid, obj.phase.as_str()], obj.value);
        if obj.malformed {
            metric.label_values.pop();
        }
        Family::new(vec![metric])
    })
    .with_aggregation("owner", by_namespace_and_owner(&["phase"]))
    .with_aggregation("phase", by_labels(&["phase"]));

    let value = FamilyGenerator::new(VALUE, "Object value.", MetricType::Counter, |obj: &DstObject| {
        Family::new(vec![Metric::new(["phase"], [obj.phase.as_str()], obj.value)])
    })
    .with_aggregation("phase", by_labels(&["phase"]));

    // VALUE is a non-empty literal, so building the denylist cannot fail
    let policy = AllowDenyList::denylist([VALUE]).unwrap_or_default();
    StoreSchema::filtered(&policy, vec![info, value])
}

/// Operation type for logging
#[derive(Debug, Clone)]
pub enum StoreOp {
    Add { identity: String, malformed: bool },
    Update { identity: String, malformed: bool },
    Delete { identity: String },
    Replace { objects: usize, malformed: bool },
}

/// Result of a store DST run
#[derive(Debug, Clone)]
pub struct StoreDSTResult {
    pub seed: u64,
    pub total_operations: u64,
    pub adds: u64,
    pub updates: u64,
    pub deletes: u64,
    pub replaces: u64,
    pub unknown_identity: u64,
    pub malformed_rejected: u64,
    pub invariant_violations: Vec<String>,
    pub last_op: Option<StoreOp>,
}

impl StoreDSTResult {
    pub fn new(seed: u64) -> Self {
        StoreDSTResult {
            seed,
            total_operations: 0,
            adds: 0,
            updates: 0,
            deletes: 0,
            replaces: 0,
            unknown_identity: 0,
            malformed_rejected: 0,
            invariant_violations: Vec::new(),
            last_op: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops (adds:{}, updates:{}, deletes:{}, replaces:{}, unknown:{}, malformed:{}), {} violations",
            self.seed,
            self.total_operations,
            self.adds,
            self.updates,
            self.deletes,
            self.replaces,
            self.unknown_identity,
            self.malformed_rejected,
            self.invariant_violations.len()
        )
    }
}

/// Expected outcome of a mutation
#[derive(Debug, PartialEq)]
enum Outcome {
    Ok,
    Malformed,
    Unknown,
}

fn outcome_of(result: &Result<(), StoreError>) -> Option<Outcome> {
    match result {
        Ok(()) => Some(Outcome::Ok),
        Err(StoreError::MalformedMetric { .. }) => Some(Outcome::Malformed),
        Err(StoreError::UnknownIdentity(_)) => Some(Outcome::Unknown),
        Err(_) => None,
    }
}

/// DST harness for MetricsStore
pub struct StoreDSTHarness {
    config: StoreDSTConfig,
    rng: ChaCha8Rng,
    store: MetricsStore<DstObject>,
    result: StoreDSTResult,
    /// Objects the store should currently hold
    expected: HashMap<String, DstObject>,
}

impl StoreDSTHarness {
    pub fn new(config: StoreDSTConfig) -> Self {
        StoreDSTHarness {
            result: StoreDSTResult::new(config.seed),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            store: MetricsStore::new(dst_schema()),
            expected: HashMap::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(StoreDSTConfig::new(seed))
    }

    fn random_identity(&mut self) -> String {
        let idx = self.rng.gen_range(0..self.config.num_identities.max(1));
        format!("uid-{}", idx)
    }

    fn random_object(&mut self, identity: &str) -> DstObject {
        let phase = PHASES[self.rng.gen_range(0..PHASES.len())].to_string();
        let value = self.rng.gen_range(0..100) as f64;
        let malformed = self.rng.gen_bool(self.config.malformed_prob.clamp(0.0, 1.0));

        let meta = if self.rng.gen_bool(self.config.bare_prob.clamp(0.0, 1.0)) {
            None
        } else {
            let ns = format!("ns-{}", self.rng.gen_range(0..self.config.num_namespaces.max(1)));
            let mut meta = ObjectMeta::new(ns, identity).with_uid(identity);
            let owners = self.rng.gen_range(0..=self.config.max_owners);
            for i in 0..owners {
                let kind = OWNER_KINDS[self.rng.gen_range(0..OWNER_KINDS.len())];
                let mut owner = OwnerReference::new(kind, format!("owner-{}", i));
                owner.controller = match self.rng.gen_range(0..3) {
                    0 => Some(true),
                    1 => Some(false),
                    _ => None,
                };
                meta = meta.with_owner(owner);
            }
            Some(meta)
        };

        DstObject {
            meta,
            phase,
            value,
            malformed,
        }
    }

    fn check_outcome(&mut self, op: &str, result: &Result<(), StoreError>, expected: Outcome) {
        match outcome_of(result) {
            Some(actual) if actual == expected => {}
            other => self.result.invariant_violations.push(format!(
                "{} outcome mismatch: expected {:?}, got {:?} ({:?})",
                op, expected, other, result
            )),
        }
    }

    fn run_single_op(&mut self) {
        let roll = self.rng.gen_range(0.0..1.0);
        let replace_threshold = self.config.replace_prob;
        let delete_threshold = replace_threshold + self.config.delete_prob;
        let update_threshold = delete_threshold + self.config.update_prob;

        if roll < replace_threshold {
            self.run_replace();
        } else if roll < delete_threshold {
            let identity = self.random_identity();
            self.result.last_op = Some(StoreOp::Delete {
                identity: identity.clone(),
            });
            let existed = self.expected.remove(&identity).is_some();
            let result = self.store.delete(&identity);
            if existed {
                self.result.deletes += 1;
                self.check_outcome("delete", &result, Outcome::Ok);
            } else {
                self.result.unknown_identity += 1;
                self.check_outcome("delete", &result, Outcome::Unknown);
            }
        } else if roll < update_threshold {
            let identity = self.random_identity();
            let obj = self.random_object(&identity);
            self.result.last_op = Some(StoreOp::Update {
                identity: identity.clone(),
                malformed: obj.malformed,
            });
            let result = self.store.update(&identity, &obj);
            if obj.malformed {
                self.result.malformed_rejected += 1;
                self.check_outcome("update", &result, Outcome::Malformed);
            } else if !self.expected.contains_key(&identity) {
                self.result.unknown_identity += 1;
                self.check_outcome("update", &result, Outcome::Unknown);
            } else {
                self.result.updates += 1;
                self.expected.insert(identity, obj);
                self.check_outcome("update", &result, Outcome::Ok);
            }
        } else {
            let identity = self.random_identity();
            let obj = self.random_object(&identity);
            self.result.last_op = Some(StoreOp::Add {
                identity: identity.clone(),
                malformed: obj.malformed,
            });
            let result = self.store.add(&identity, &obj);
            if obj.malformed {
                self.result.malformed_rejected += 1;
                self.check_outcome("add", &result, Outcome::Malformed);
            } else {
                self.result.adds += 1;
                self.expected.insert(identity, obj);
                self.check_outcome("add", &result, Outcome::Ok);
            }
        }

        self.result.total_operations += 1;

        if let Err(violation) = self.check_invariants() {
            self.result.invariant_violations.push(format!(
                "Op #{}: {:?} - {}",
                self.result.total_operations, self.result.last_op, violation
            ));
        }
    }

    fn run_replace(&mut self) {
        let count = self.rng.gen_range(0..=self.config.num_identities);
        let mut fresh: BTreeMap<String, DstObject> = BTreeMap::new();
        for _ in 0..count {
            let identity = self.random_identity();
            let obj = self.random_object(&identity);
            fresh.insert(identity, obj);
        }
        let malformed = fresh.values().any(|o| o.malformed);
        self.result.last_op = Some(StoreOp::Replace {
            objects: fresh.len(),
            malformed,
        });

        let result = self.store.replace(fresh.iter().map(|(id, obj)| (id.as_str(), obj)));
        if malformed {
            self.result.malformed_rejected += 1;
            self.check_outcome("replace", &result, Outcome::Malformed);
        } else {
            self.result.replaces += 1;
            self.expected = fresh.into_iter().collect();
            self.check_outcome("replace", &result, Outcome::Ok);
        }
    }

    /// Sample lines the store must render for the shadow state, per block
    fn expected_blocks(&self) -> Vec<(String, Vec<String>)> {
        let mut info = Vec::new();
        let mut info_by_owner = Vec::new();
        let mut info_by_phase = Vec::new();
        let mut value_by_phase = Vec::new();

        for (identity, obj) in &self.expected {
            let value = format_value(obj.value);
            let phase = escape_label_value(&obj.phase);
            let uid = obj.meta.as_ref().map(|_| identity.as_str()).unwrap_or("");
            info.push(format!("{}{{uid=\"{}\",phase=\"{}\"}} {}", INFO, uid, phase, value));
            info_by_phase.push(format!("{}_by_phase{{phase=\"{}\"}} {}", INFO, phase, value));
            value_by_phase.push(format!("{}_by_phase{{phase=\"{}\"}} {}", VALUE, phase, value));

            // Objects without metadata lose only their owner rows
            if let Some(meta) = &obj.meta {
                let owners: Vec<(String, String, String)> = if meta.owner_references.is_empty() {
                    vec![("<none>".into(), "<none>".into(), "<none>".into())]
                } else {
                    meta.owner_references
                        .iter()
                        .map(|o| {
                            (
                                o.kind_label().to_string(),
                                o.name_label().to_string(),
                                o.controller_label().to_string(),
                            )
                        })
                        .collect()
                };
                for (kind, name, controller) in owners {
                    info_by_owner.push(format!(
                        "{}_by_owner{{namespace=\"{}\",owner_kind=\"{}\",owner_name=\"{}\",owner_is_controller=\"{}\",phase=\"{}\"}} {}",
                        INFO, meta.namespace, kind, name, controller, phase, value
                    ));
                }
            }
        }

        vec![
            (INFO.to_string(), info),
            (format!("{}_by_owner", INFO), info_by_owner),
            (format!("{}_by_phase", INFO), info_by_phase),
            (VALUE.to_string(), Vec::new()),
            (format!("{}_by_phase", VALUE), value_by_phase),
        ]
    }

    fn check_invariants(&self) -> Result<(), String> {
        // Invariant 1: object count matches shadow state
        if self.store.len() != self.expected.len() {
            return Err(format!(
                "Length mismatch: actual={}, expected={}",
                self.store.len(),
                self.expected.len()
            ));
        }

        // Invariant 2: every shadow identity is stored
        for identity in self.expected.keys() {
            if !self.store.contains(identity) {
                return Err(format!("Expected identity '{}' not found", identity));
            }
        }

        // Invariant 3: the render is the expected blocks, in generator order,
        // each block a header pair followed by exactly the expected samples
        let rendered = self.store.render_to_string();
        let mut lines = rendered.lines().peekable();
        for (name, mut expected) in self.expected_blocks() {
            let help = lines.next().unwrap_or_default();
            let type_line = lines.next().unwrap_or_default();
            if !help.starts_with(&format!("# HELP {} ", name)) || !type_line.starts_with(&format!("# TYPE {} ", name)) {
                return Err(format!("Missing header for {}: {:?} / {:?}", name, help, type_line));
            }

            let mut actual = Vec::new();
            while let Some(line) = lines.peek() {
                if line.starts_with('#') {
                    break;
                }
                actual.push(line.to_string());
                lines.next();
            }

            actual.sort();
            expected.sort();
            if actual != expected {
                return Err(format!(
                    "Samples mismatch for {}: actual={:?}, expected={:?}",
                    name, actual, expected
                ));
            }
        }

        if let Some(extra) = lines.next() {
            return Err(format!("Unexpected trailing line: {:?}", extra));
        }

        Ok(())
    }

    pub fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            self.run_single_op();
            if !self.result.invariant_violations.is_empty() {
                break;
            }
        }
    }

    pub fn result(&self) -> &StoreDSTResult {
        &self.result
    }

    pub fn store(&self) -> &MetricsStore<DstObject> {
        &self.store
    }
}

/// Run a batch of DST tests
pub fn run_store_batch(
    start_seed: u64,
    num_seeds: usize,
    ops_per_seed: usize,
    config_fn: fn(u64) -> StoreDSTConfig,
) -> Vec<StoreDSTResult> {
    (0..num_seeds)
        .map(|i| {
            let seed = start_seed + i as u64;
            let config = config_fn(seed);
            let mut harness = StoreDSTHarness::new(config);
            harness.run(ops_per_seed);
            harness.result().clone()
        })
        .collect()
}

/// Summarize batch results
pub fn summarize_store_batch(results: &[StoreDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();

    let mut summary = format!(
        "Store DST Summary\n\
         =================\n\
         Seeds: {} total, {} passed, {} failed\n\
         Total operations: {}\n",
        total, passed, failed, total_ops
    );

    if failed > 0 {
        summary.push_str("\nFailed seeds:\n");
        for result in results.iter().filter(|r| !r.is_success()) {
            summary.push_str(&format!("  Seed {}: {}\n", result.seed, result.summary()));
            for violation in &result.invariant_violations {
                summary.push_str(&format!("    - {}\n", violation));
            }
        }
    }

    summary
}
