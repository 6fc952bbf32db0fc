//! Directory access
//!
//! The directory is the authoritative record store: IPAM addresses,
//! inventories and per-machine assets. It is read on every request and never
//! cached, so a machine that becomes provisioned between two requests is
//! served correctly on the second one.
//!
//! Backends implement the four read primitives of [`Directory`];
//! [`DirectoryGateway`] layers the boot service's lookups on top of them.

mod kubernetes;
mod memory;

pub use kubernetes::KubeDirectory;
pub use memory::{DirectoryFixture, MemoryDirectory};

use async_trait::async_trait;
use bootward_crd::{ip_label_value, Inventory, Ip, IP_LABEL};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from directory reads
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// More than one object matched where exactly one was expected
    #[error("multiple matches for {0}")]
    MultipleMatches(String),

    /// A matched object is missing data it must carry
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The backend could not be reached or refused the request
    #[error("directory backend error: {0}")]
    Backend(String),

    /// An object could not be decoded
    #[error("failed to decode {kind} {name}: {reason}")]
    Decode {
        kind: &'static str,
        name: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Read primitives every directory backend provides.
///
/// A missing object is `Ok(None)`; errors are reserved for transport and
/// decoding failures.
#[async_trait]
pub trait Directory: Send + Sync {
    /// List IPAM addresses matching an exact `key=value` label selector
    async fn list_ips(&self, namespace: &str, label_selector: &str) -> Result<Vec<Ip>>;

    async fn get_inventory(&self, namespace: &str, name: &str) -> Result<Option<Inventory>>;

    /// Secret data by key
    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<BTreeMap<String, Vec<u8>>>>;

    /// Config map data by key
    async fn get_config_map(&self, namespace: &str, name: &str)
        -> Result<Option<BTreeMap<String, String>>>;
}

/// A machine as the boot service sees it
#[derive(Debug, Clone, PartialEq)]
pub struct MachineRecord {
    /// Inventory name (the machine UUID)
    pub name: String,
    /// Assigned identity; `None` until the machine has been provisioned
    pub identity: Option<String>,
    /// Normalized MACs bound to the machine
    pub bound_macs: Vec<String>,
    pub hostname: Option<String>,
}

impl From<&Inventory> for MachineRecord {
    fn from(inventory: &Inventory) -> Self {
        Self {
            name: inventory.metadata.name.clone(),
            identity: inventory.system_id().map(str::to_string),
            bound_macs: inventory.bound_macs(),
            hostname: inventory.host_name().map(str::to_string),
        }
    }
}

/// Namespaces the gateway reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub assets: String,
    pub ipam: String,
    pub inventory: String,
}

/// Boot-service lookups over a [`Directory`] backend
#[derive(Clone)]
pub struct DirectoryGateway {
    directory: Arc<dyn Directory>,
    namespaces: Namespaces,
}

impl DirectoryGateway {
    pub fn new(directory: Arc<dyn Directory>, namespaces: Namespaces) -> Self {
        Self {
            directory,
            namespaces,
        }
    }

    /// MAC leased the given canonical address.
    ///
    /// No match is an unknown client (`None`); more than one match is an
    /// integrity error.
    pub async fn mac_for_ip(&self, ip: &str) -> Result<Option<String>> {
        let selector = format!("{}={}", IP_LABEL, ip_label_value(ip));
        let ips = self.directory.list_ips(&self.namespaces.ipam, &selector).await?;

        match ips.as_slice() {
            [] => {
                debug!(client_ip = %ip, "Address is unknown");
                Ok(None)
            }
            [one] => {
                let mac = one
                    .mac()
                    .map_err(|e| DirectoryError::Integrity(e.to_string()))?
                    .ok_or_else(|| {
                        DirectoryError::Integrity(format!("no MAC recorded for address {}", ip))
                    })?;
                debug!(client_ip = %ip, mac = %mac, "Found MAC for address");
                Ok(Some(mac))
            }
            _ => Err(DirectoryError::MultipleMatches(format!("address {}", ip))),
        }
    }

    pub async fn machine_record(&self, uuid: &str) -> Result<Option<MachineRecord>> {
        let inventory = self
            .directory
            .get_inventory(&self.namespaces.inventory, uuid)
            .await?;
        Ok(inventory.as_ref().map(MachineRecord::from))
    }

    /// A named part of the machine's `ipxe-<uuid>` assets.
    ///
    /// The secret is consulted before the config map; empty values count as
    /// absent.
    pub async fn asset_part(&self, uuid: &str, part: &str) -> Result<Option<Vec<u8>>> {
        let name = asset_object_name(uuid);

        if let Some(data) = self.directory.get_secret(&self.namespaces.assets, &name).await? {
            if let Some(value) = data.get(part).filter(|v| !v.is_empty()) {
                return Ok(Some(value.clone()));
            }
        }

        if let Some(data) = self
            .directory
            .get_config_map(&self.namespaces.assets, &name)
            .await?
        {
            if let Some(value) = data.get(part).filter(|v| !v.is_empty()) {
                return Ok(Some(value.clone().into_bytes()));
            }
        }

        Ok(None)
    }

    /// Cluster-join kubeconfig handed to a provisioning machine
    pub async fn bootstrap_credential(&self, uuid: &str) -> Result<Option<Vec<u8>>> {
        let name = format!("kubeconfig-inventory-{}", uuid);
        let secret = self
            .directory
            .get_secret(&self.namespaces.inventory, &name)
            .await?;
        Ok(secret
            .and_then(|mut data| data.remove("kubeconfig"))
            .filter(|v| !v.is_empty()))
    }
}

/// Name of the secret and config map holding a machine's assets
pub fn asset_object_name(uuid: &str) -> String {
    format!("ipxe-{}", uuid)
}
