//! IPAM address types
//!
//! An `IP` object records one address handed out by IPAM. The boot service
//! only relies on its labels: `ip` (the label form of the address) and `mac`
//! (the MAC the address was leased to).

use crate::{normalize_mac, ObjectMeta, Result, TypeMeta};
use serde::{Deserialize, Serialize};

/// Label holding the address in label form
pub const IP_LABEL: &str = "ip";

/// Label holding the MAC the address belongs to
pub const MAC_LABEL: &str = "mac";

/// IPAM address resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ip {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata (name, namespace, labels, etc.)
    pub metadata: ObjectMeta,

    /// Address specification
    #[serde(default)]
    pub spec: IpSpec,

    /// Address status (set by the IPAM controller)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IpStatus>,
}

impl Ip {
    /// Create an address object labelled with its address and MAC
    pub fn new(name: impl Into<String>, ip_label: impl Into<String>, mac_label: impl Into<String>) -> Self {
        Self {
            type_meta: TypeMeta::ip(),
            metadata: ObjectMeta::new(name)
                .with_label(IP_LABEL, ip_label)
                .with_label(MAC_LABEL, mac_label),
            spec: IpSpec::default(),
            status: None,
        }
    }

    /// Place the object in a namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    /// The normalized MAC from the `mac` label.
    ///
    /// Returns `Ok(None)` when the label is absent and an error when it is
    /// present but malformed.
    pub fn mac(&self) -> Result<Option<String>> {
        self.metadata
            .label(MAC_LABEL)
            .map(normalize_mac)
            .transpose()
    }
}

/// Address specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IpSpec {
    /// Subnet the address was allocated from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<LocalObjectReference>,

    /// Requested address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Address status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IpStatus {
    /// Allocation state (e.g., "Finished")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Reserved address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved: Option<String>,
}

/// Reference to an object in the same namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LocalObjectReference {
    pub name: String,
}
