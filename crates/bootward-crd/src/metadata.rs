//! Common metadata types for directory resources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kubernetes-style object metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name (required)
    #[serde(default)]
    pub name: String,

    /// Namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Resource version for optimistic concurrency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Labels for organizing resources
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations for storing arbitrary metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create new metadata with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Get a label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Type metadata for directory objects
///
/// Items of a list response carry no type metadata, so both fields default
/// to empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// API version (e.g., "metal.ironcore.dev/v1alpha4")
    #[serde(default)]
    pub api_version: String,

    /// Kind (e.g., "Inventory", "IP")
    #[serde(default)]
    pub kind: String,
}

impl TypeMeta {
    /// Create type metadata for IPAM addresses
    pub fn ip() -> Self {
        Self {
            api_version: crate::IPAM_API_VERSION.to_string(),
            kind: "IP".to_string(),
        }
    }

    /// Create type metadata for inventories
    pub fn inventory() -> Self {
        Self {
            api_version: crate::INVENTORY_API_VERSION.to_string(),
            kind: "Inventory".to_string(),
        }
    }
}
