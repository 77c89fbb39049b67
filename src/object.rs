//! Object metadata capability
//!
//! The store never inspects concrete object schemas. Generation transforms
//! receive the caller's object type directly; owner-based aggregations only
//! need the metadata accessor below. Objects that cannot provide metadata
//! keep the default `meta()` and are still usable with plain generation and
//! label-projection aggregations.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

use crate::aggregation::NONE_LABEL;

/// Decode `null` like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Back-link from a managed object to an owning object
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    #[serde(default, deserialize_with = "null_as_default")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uid: String,
    /// Unset is treated as `false`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
}

impl OwnerReference {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        OwnerReference {
            kind: Some(kind.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_controller(mut self, controller: bool) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Owner kind as an exposition label value, `<none>` when absent
    pub fn kind_label(&self) -> &str {
        self.kind.as_deref().unwrap_or(NONE_LABEL)
    }

    /// Owner name as an exposition label value, `<none>` when absent
    pub fn name_label(&self) -> &str {
        self.name.as_deref().unwrap_or(NONE_LABEL)
    }

    /// Controller flag as an exposition label value
    pub fn controller_label(&self) -> &'static str {
        if self.controller.unwrap_or(false) {
            "true"
        } else {
            "false"
        }
    }
}

/// Object metadata relevant to metric generation
///
/// Absent and `null` fields decode to their empty value, so a partially
/// filled metadata block still provides the capability.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectMeta {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner_references.push(owner);
        self
    }
}

/// A watched object
pub trait Object {
    /// Metadata accessor, `None` when the object carries no metadata
    fn meta(&self) -> Option<Cow<'_, ObjectMeta>> {
        None
    }
}

impl Object for ObjectMeta {
    fn meta(&self) -> Option<Cow<'_, ObjectMeta>> {
        Some(Cow::Borrowed(self))
    }
}

/// Loosely typed objects as delivered by a JSON watch stream
///
/// Metadata is read from the top-level `metadata` field. A missing or
/// undecodable field means the object lacks the capability.
impl Object for serde_json::Value {
    fn meta(&self) -> Option<Cow<'_, ObjectMeta>> {
        let metadata = self.get("metadata")?;
        ObjectMeta::deserialize(metadata).ok().map(Cow::Owned)
    }
}

impl<T: Object + ?Sized> Object for &T {
    fn meta(&self) -> Option<Cow<'_, ObjectMeta>> {
        (**self).meta()
    }
}

impl<T: Object + ?Sized> Object for std::sync::Arc<T> {
    fn meta(&self) -> Option<Cow<'_, ObjectMeta>> {
        (**self).meta()
    }
}
