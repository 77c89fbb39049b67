//! Stateright Model for the MetricsStore lifecycle
//!
//! Explores every interleaving of add/update/delete over a few identities,
//! replays each path against a real store and checks:
//! - CONTENTS_MATCH: the store holds exactly the identities the model expects
//! - AGGREGATE_IS_SUM: per label value, derived rows sum to the values of
//!   the objects currently present
//! - NO_STALE_ROWS: no line mentions an identity that is not present
//! - FAILED_MUTATION_NO_EFFECT: rejected calls fail the way the model
//!   predicts and change nothing

use std::collections::BTreeMap;

use stateright::{Model, Property};

use crate::aggregation::by_labels;
use crate::generator::FamilyGenerator;
use crate::metric::{Family, Metric, MetricType};
use crate::object::ObjectMeta;
use crate::store::{MetricsStore, StoreError, StoreSchema};

const PHASES: [&str; 2] = ["Running", "Pending"];

/// Abstract object: phase index and value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjState {
    pub phase: u8,
    pub value: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StoreAction {
    Add { id: u8, obj: ObjState },
    Update { id: u8, obj: ObjState },
    Delete { id: u8 },
}

/// A path of actions; properties replay it against a real store
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StoreModelState {
    pub log: Vec<StoreAction>,
}

/// Result of replaying a path
struct Replay {
    contents: BTreeMap<u8, ObjState>,
    rendered: String,
    stored: usize,
    unexpected: usize,
}

/// Object the model feeds the store: the phase and value ride on the name
fn to_object(id: u8, obj: ObjState) -> ObjectMeta {
    let phase = PHASES[obj.phase as usize % PHASES.len()];
    ObjectMeta::new("default", format!("{}:{}", phase, obj.value)).with_uid(format!("obj-{}", id))
}

fn model_store() -> MetricsStore<ObjectMeta> {
    let generator = FamilyGenerator::new("model_info", "Model info.", MetricType::Gauge, |obj: &ObjectMeta| {
        let (phase, value) = obj.name.split_once(':').unwrap_or(("", "0"));
        let value: f64 = value.parse().unwrap_or(0.0);
        Family::new(vec![Metric::new(["uid", "phase"], [obj.uid.as_str(), phase], value)])
    })
    .with_aggregation("phase", by_labels(&["phase"]));
    MetricsStore::new(StoreSchema::from_generators(vec![generator]))
}

fn replay(log: &[StoreAction]) -> Replay {
    let store = model_store();
    let mut contents = BTreeMap::new();
    let mut unexpected = 0;

    for action in log {
        let (result, expect_ok) = match *action {
            StoreAction::Add { id, obj } => {
                contents.insert(id, obj);
                (store.add(&format!("obj-{}", id), &to_object(id, obj)), true)
            }
            StoreAction::Update { id, obj } => {
                let known = contents.contains_key(&id);
                if known {
                    contents.insert(id, obj);
                }
                (store.update(&format!("obj-{}", id), &to_object(id, obj)), known)
            }
            StoreAction::Delete { id } => {
                let known = contents.remove(&id).is_some();
                (store.delete(&format!("obj-{}", id)), known)
            }
        };

        match (result, expect_ok) {
            (Ok(()), true) | (Err(StoreError::UnknownIdentity(_)), false) => {}
            _ => unexpected += 1,
        }
    }

    Replay {
        contents,
        rendered: store.render_to_string(),
        stored: store.len(),
        unexpected,
    }
}

/// Sum the values of `prefix{...phase="<phase>"...} value` lines
fn sum_rows(rendered: &str, prefix: &str, phase: &str) -> u64 {
    let needle = format!("phase=\"{}\"", phase);
    rendered
        .lines()
        .filter(|line| line.starts_with(prefix) && line.contains(&needle))
        .filter_map(|line| line.rsplit(' ').next())
        .filter_map(|v| v.parse::<u64>().ok())
        .sum()
}

pub struct StoreLifecycleModel {
    pub ids: Vec<u8>,
    pub values: Vec<u8>,
    pub max_depth: usize,
}

impl StoreLifecycleModel {
    pub fn new() -> Self {
        StoreLifecycleModel {
            ids: vec![0, 1],
            values: vec![1, 2],
            max_depth: 4,
        }
    }

    fn objects(&self) -> Vec<ObjState> {
        let mut out = Vec::new();
        for phase in 0..PHASES.len() as u8 {
            for &value in &self.values {
                out.push(ObjState { phase, value });
            }
        }
        out
    }
}

impl Default for StoreLifecycleModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for StoreLifecycleModel {
    type State = StoreModelState;
    type Action = StoreAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![StoreModelState::default()]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        if state.log.len() >= self.max_depth {
            return;
        }
        for &id in &self.ids {
            for obj in self.objects() {
                actions.push(StoreAction::Add { id, obj });
                actions.push(StoreAction::Update { id, obj });
            }
            actions.push(StoreAction::Delete { id });
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        next.log.push(action);
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("contents_match", |_: &StoreLifecycleModel, state: &StoreModelState| {
                let r = replay(&state.log);
                r.stored == r.contents.len()
            }),
            Property::always("aggregate_is_sum", |_: &StoreLifecycleModel, state: &StoreModelState| {
                let r = replay(&state.log);
                (0..PHASES.len()).all(|p| {
                    let expected: u64 = r
                        .contents
                        .values()
                        .filter(|o| o.phase as usize == p)
                        .map(|o| o.value as u64)
                        .sum();
                    sum_rows(&r.rendered, "model_info_by_phase{", PHASES[p]) == expected
                })
            }),
            Property::always("no_stale_rows", |model: &StoreLifecycleModel, state: &StoreModelState| {
                let r = replay(&state.log);
                model.ids.iter().all(|id| {
                    let mentioned = r.rendered.contains(&format!("uid=\"obj-{}\"", id));
                    mentioned == r.contents.contains_key(id)
                })
            }),
            Property::always(
                "failed_mutation_no_effect",
                |_: &StoreLifecycleModel, state: &StoreModelState| replay(&state.log).unexpected == 0,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_add_update_delete() {
        let obj = ObjState { phase: 0, value: 2 };
        let log = vec![
            StoreAction::Add { id: 0, obj },
            StoreAction::Update {
                id: 0,
                obj: ObjState { phase: 1, value: 1 },
            },
            StoreAction::Add { id: 1, obj },
            StoreAction::Delete { id: 1 },
        ];
        let r = replay(&log);
        assert_eq!(r.unexpected, 0);
        assert_eq!(r.stored, 1);
        assert_eq!(sum_rows(&r.rendered, "model_info_by_phase{", "Pending"), 1);
        assert_eq!(sum_rows(&r.rendered, "model_info_by_phase{", "Running"), 0);
        assert!(!r.rendered.contains("obj-1"));
    }

    #[test]
    fn test_replay_unknown_identity() {
        let log = vec![
            StoreAction::Delete { id: 0 },
            StoreAction::Update {
                id: 1,
                obj: ObjState { phase: 0, value: 1 },
            },
        ];
        let r = replay(&log);
        assert_eq!(r.unexpected, 0);
        assert_eq!(r.stored, 0);
        assert!(!r.rendered.contains("obj-"));
    }

    #[test]
    fn test_sum_rows_same_label_set() {
        let log = vec![
            StoreAction::Add {
                id: 0,
                obj: ObjState { phase: 0, value: 1 },
            },
            StoreAction::Add {
                id: 1,
                obj: ObjState { phase: 0, value: 2 },
            },
        ];
        let r = replay(&log);
        // Two rows with identical labels, summed by the reader
        assert_eq!(r.rendered.matches("model_info_by_phase{phase=\"Running\"}").count(), 2);
        assert_eq!(sum_rows(&r.rendered, "model_info_by_phase{", "Running"), 3);
    }

    #[test]
    #[ignore] // Run with: cargo test stateright_store -- --ignored --nocapture
    fn stateright_store_model_check() {
        use stateright::Checker;

        let model = StoreLifecycleModel::new();
        let checker = model.checker().spawn_bfs().join();

        println!("States explored: {}", checker.unique_state_count());

        checker.assert_properties();

        println!("Model check passed! All store lifecycle invariants hold.");
    }
}
