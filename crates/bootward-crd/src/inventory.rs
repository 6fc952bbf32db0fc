//! Inventory types
//!
//! An `Inventory` describes one physical machine. Its name is the machine
//! UUID the machine reports during boot. Once the machine has been
//! provisioned `spec.system.id` carries its assigned identity; until then it
//! is absent or empty.
//!
//! MACs bound to the machine are declared as labels:
//! `metal.ironcore.dev/mac-address-<12 hex digits>`.

use crate::{normalize_mac, ObjectMeta, TypeMeta, INVENTORY_MAC_LABEL_PREFIX};
use serde::{Deserialize, Serialize};

/// Inventory resource representing a physical machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata (name, namespace, labels, etc.)
    pub metadata: ObjectMeta,

    /// Inventory specification
    #[serde(default)]
    pub spec: InventorySpec,
}

impl Inventory {
    /// Create a new, not yet provisioned inventory
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::inventory(),
            metadata: ObjectMeta::new(name),
            spec: InventorySpec::default(),
        }
    }

    /// Set the assigned system identity
    pub fn with_system_id(mut self, id: impl Into<String>) -> Self {
        self.spec.system = Some(SystemSpec { id: id.into() });
        self
    }

    /// Set the host name
    pub fn with_host_name(mut self, name: impl Into<String>) -> Self {
        self.spec.host = Some(HostSpec { name: name.into() });
        self
    }

    /// Declare a MAC as bound to this machine
    pub fn with_bound_mac(mut self, mac: &str) -> Self {
        let hex: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        self.metadata.labels.insert(
            format!("{}{}", INVENTORY_MAC_LABEL_PREFIX, hex.to_ascii_lowercase()),
            String::new(),
        );
        self
    }

    /// Place the object in a namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    /// Assigned system identity, if the machine has been provisioned
    pub fn system_id(&self) -> Option<&str> {
        self.spec
            .system
            .as_ref()
            .map(|s| s.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Host name, if set and non-empty
    pub fn host_name(&self) -> Option<&str> {
        self.spec
            .host
            .as_ref()
            .map(|h| h.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Normalized MACs declared through the MAC labels.
    ///
    /// Labels whose suffix is not a valid MAC are ignored.
    pub fn bound_macs(&self) -> Vec<String> {
        self.metadata
            .labels
            .keys()
            .filter_map(|key| key.strip_prefix(INVENTORY_MAC_LABEL_PREFIX))
            .filter_map(|suffix| normalize_mac(suffix).ok())
            .collect()
    }
}

/// Inventory specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InventorySpec {
    /// System information; `id` is the assigned identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemSpec>,

    /// Host information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<HostSpec>,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SystemSpec {
    #[serde(default)]
    pub id: String,
}

/// Host information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HostSpec {
    #[serde(default)]
    pub name: String,
}
