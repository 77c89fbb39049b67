//! Concurrent metrics store
//!
//! Holds the rendered metrics of every object, keyed by an externally
//! supplied identity, and renders the whole corpus on demand.
//!
//! ## Locking
//!
//! ```text
//! add/update:  generate -> validate -> render   (no lock)
//!              write lock: swap entry           (short)
//! write_all:   read lock for the whole render
//! ```
//!
//! Mutations are fully rendered before the write lock is taken, so a render
//! never observes a half-applied add, update or delete. The store keeps only
//! its rendered copies and holds no reference to the caller's object once a
//! call returns.

use std::io::Write;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::error::StoreError;
use super::schema::StoreSchema;

/// Rendered output of one object
#[derive(Debug, Clone, Default)]
struct StoredEntry {
    /// Raw lines, one block per generator
    families: Vec<String>,
    /// Derived lines, per generator, per aggregation entry
    aggregated: Vec<Vec<String>>,
}

pub struct MetricsStore<O> {
    schema: StoreSchema<O>,
    entries: RwLock<AHashMap<String, StoredEntry>>,
}

impl<O> std::fmt::Debug for MetricsStore<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStore")
            .field("schema", &self.schema)
            .field("objects", &self.len())
            .finish()
    }
}

impl<O> MetricsStore<O> {
    pub fn new(schema: StoreSchema<O>) -> Self {
        info!(
            families = schema.family_count(),
            shard_hint = schema.shard_hint(),
            "metrics store created"
        );
        MetricsStore {
            schema,
            entries: RwLock::new(AHashMap::new()),
        }
    }

    pub fn schema(&self) -> &StoreSchema<O> {
        &self.schema
    }

    pub fn shard_hint(&self) -> u32 {
        self.schema.shard_hint()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.read().contains_key(identity)
    }

    /// Generate, validate and render everything `obj` contributes
    fn render(&self, identity: &str, obj: &O) -> Result<StoredEntry, StoreError> {
        let families = self.schema.generate(obj);
        if families.len() != self.schema.family_count() {
            return Err(StoreError::FamilyCountMismatch {
                expected: self.schema.family_count(),
                actual: families.len(),
            });
        }

        for family in &families {
            if let Some(index) = family.first_malformed() {
                let metric = &family.metrics[index];
                return Err(StoreError::MalformedMetric {
                    family: family.name.clone(),
                    index,
                    keys: metric.label_keys.len(),
                    values: metric.label_values.len(),
                });
            }
            if let Some((index, label)) = family.first_duplicate_key() {
                return Err(StoreError::DuplicateLabel {
                    family: family.name.clone(),
                    index,
                    label: label.to_string(),
                });
            }
        }

        let mut entry = StoredEntry {
            families: Vec::with_capacity(families.len()),
            aggregated: Vec::with_capacity(families.len()),
        };

        for (i, family) in families.iter().enumerate() {
            // Aggregations-only families are generated as input but never emitted
            if self.schema.aggregations_only(i) {
                entry.families.push(String::new());
            } else {
                entry.families.push(family.render());
            }

            let rows = match self.schema.aggregation_set(i) {
                Some(set) => set
                    .render(obj, family)
                    .into_iter()
                    .zip(set.entries())
                    .map(|(rendered, agg)| {
                        rendered.unwrap_or_else(|e| {
                            warn!(
                                identity,
                                family = %family.name,
                                aggregation = %agg.name,
                                error = %e,
                                "aggregation skipped for object"
                            );
                            String::new()
                        })
                    })
                    .collect(),
                None => Vec::new(),
            };
            entry.aggregated.push(rows);
        }

        Ok(entry)
    }

    /// Store the rendering of `obj` under `identity`
    ///
    /// An identity that is already present is replaced.
    pub fn add(&self, identity: &str, obj: &O) -> Result<(), StoreError> {
        let entry = self.render(identity, obj)?;
        let previous = self.entries.write().insert(identity.to_string(), entry);
        if previous.is_some() {
            debug!(identity, "object re-added, entry replaced");
        } else {
            debug!(identity, "object added");
        }
        Ok(())
    }

    /// Replace the rendering stored under an existing `identity`
    pub fn update(&self, identity: &str, obj: &O) -> Result<(), StoreError> {
        let entry = self.render(identity, obj)?;
        let mut entries = self.entries.write();
        match entries.get_mut(identity) {
            Some(slot) => {
                *slot = entry;
                debug!(identity, "object updated");
                Ok(())
            }
            None => Err(StoreError::UnknownIdentity(identity.to_string())),
        }
    }

    /// Remove the entry stored under `identity`
    pub fn delete(&self, identity: &str) -> Result<(), StoreError> {
        match self.entries.write().remove(identity) {
            Some(_) => {
                debug!(identity, "object deleted");
                Ok(())
            }
            None => Err(StoreError::UnknownIdentity(identity.to_string())),
        }
    }

    /// Swap the whole corpus for `items`
    ///
    /// Every item is rendered first; if any fails the store is untouched.
    pub fn replace<'a, K, I>(&self, items: I) -> Result<(), StoreError>
    where
        O: 'a,
        K: Into<String>,
        I: IntoIterator<Item = (K, &'a O)>,
    {
        let mut fresh = AHashMap::new();
        for (identity, obj) in items {
            let identity = identity.into();
            let entry = self.render(&identity, obj)?;
            fresh.insert(identity, entry);
        }

        let count = fresh.len();
        *self.entries.write() = fresh;
        info!(objects = count, "store contents replaced");
        Ok(())
    }

    /// Render the full snapshot into `sink`
    ///
    /// Generator order: header, raw lines of every object (unless the family
    /// is aggregations-only), then per aggregation its header and the rows
    /// of every object. Rows are gathered from current contents on every
    /// call and never summed here.
    pub fn write_all<W: Write + ?Sized>(&self, sink: &mut W) -> Result<(), StoreError> {
        let entries = self.entries.read();

        for (i, header) in self.schema.headers().iter().enumerate() {
            sink.write_all(header.as_bytes())?;
            sink.write_all(b"\n")?;

            if !self.schema.aggregations_only(i) {
                for entry in entries.values() {
                    if let Some(lines) = entry.families.get(i) {
                        sink.write_all(lines.as_bytes())?;
                    }
                }
            }

            let Some(set) = self.schema.aggregation_set(i) else {
                continue;
            };
            for (j, agg) in set.entries().iter().enumerate() {
                sink.write_all(agg.header.as_bytes())?;
                sink.write_all(b"\n")?;
                for entry in entries.values() {
                    if let Some(rows) = entry.aggregated.get(i).and_then(|a| a.get(j)) {
                        sink.write_all(rows.as_bytes())?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Render the full snapshot into a `String`
    pub fn render_to_string(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = self.write_all(&mut buf) {
            warn!(error = %e, "in-memory render failed");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
