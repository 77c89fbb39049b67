//! Stateright model checking for the metrics store
//!
//! Exhaustive state-space exploration complements the seeded simulation in
//! [`crate::store::dst`]: the simulation covers long random runs, the model
//! covers every short interleaving.
//!
//! ## Running Model Checks
//!
//! ```bash
//! # Run all Stateright tests (marked #[ignore] for CI speed)
//! cargo test stateright -- --ignored --nocapture
//! ```
//!
//! ## Available Models
//!
//! - `store`: add/update/delete lifecycle, aggregate-equals-sum and no stale rows

pub mod store;

pub use store::StoreLifecycleModel;
