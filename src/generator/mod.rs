//! Metric family generation and filtering
//!
//! Generators are built once at startup from static configuration, pruned
//! once by [`filter_metric_families`], and immutable afterwards. The pruned
//! list fixes the scrape output order.

mod family;
mod policy;

pub use family::{
    compose_metric_gen_funcs, extract_metric_family_headers, filter_metric_families, ComposedGenerateFn,
    FamilyGenerator, GenerateFn,
};
pub use policy::{AllowDenyList, FamilyFilter, NamePattern, PolicyError};
