//! Concurrent store of rendered metrics
//!
//! A [`MetricsStore`] is the sink of an object watch: every add, update and
//! delete of a watched object is applied to it, and a scrape renders the
//! whole corpus in text exposition format through [`MetricsStore::write_all`].
//!
//! The store is built from a [`StoreSchema`], the frozen output of the
//! generator filtering step.

mod error;
mod metrics_store;
mod schema;

pub mod dst;

pub use error::StoreError;
pub use metrics_store::MetricsStore;
pub use schema::StoreSchema;
