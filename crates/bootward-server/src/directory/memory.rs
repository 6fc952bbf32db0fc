//! In-memory directory backend
//!
//! Used by tests and for running the service locally against a YAML
//! fixture instead of a cluster.

use super::{Directory, DirectoryError, Result};
use async_trait::async_trait;
use bootward_crd::{Inventory, Ip};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const DEFAULT_NAMESPACE: &str = "default";

type ObjectKey = (String, String);

/// In-memory directory keyed by (namespace, name)
#[derive(Default)]
pub struct MemoryDirectory {
    ips: RwLock<Vec<Ip>>,
    inventories: RwLock<HashMap<ObjectKey, Inventory>>,
    secrets: RwLock<HashMap<ObjectKey, BTreeMap<String, Vec<u8>>>>,
    config_maps: RwLock<HashMap<ObjectKey, BTreeMap<String, String>>>,
}

/// Directory contents as written in a fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryFixture {
    pub ips: Vec<Ip>,
    pub inventories: Vec<Inventory>,
    pub secrets: Vec<FixtureObject>,
    pub config_maps: Vec<FixtureObject>,
}

/// A secret or config map in a fixture; values are plain text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureObject {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from fixture contents
    pub fn from_fixture(fixture: DirectoryFixture) -> Self {
        let directory = Self::new();
        for ip in fixture.ips {
            directory.add_ip(ip);
        }
        for inventory in fixture.inventories {
            directory.add_inventory(inventory);
        }
        for secret in fixture.secrets {
            let ns = secret.namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
            directory.add_secret(
                &ns,
                &secret.name,
                secret.data.into_iter().map(|(k, v)| (k, v.into_bytes())),
            );
        }
        for cm in fixture.config_maps {
            let ns = cm.namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
            directory.add_config_map(&ns, &cm.name, cm.data);
        }
        directory
    }

    /// Load a YAML fixture file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DirectoryError::Backend(format!("{}: {}", path.display(), e)))?;
        let fixture: DirectoryFixture =
            serde_yaml::from_str(&raw).map_err(|e| DirectoryError::Decode {
                kind: "fixture",
                name: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn add_ip(&self, ip: Ip) {
        write(&self.ips).push(ip);
    }

    /// Insert or replace an inventory
    pub fn add_inventory(&self, inventory: Inventory) {
        let key = key_of(inventory.metadata.namespace.as_deref(), &inventory.metadata.name);
        write(&self.inventories).insert(key, inventory);
    }

    pub fn add_secret<K, I>(&self, namespace: &str, name: &str, data: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Vec<u8>)>,
    {
        let data = data.into_iter().map(|(k, v)| (k.into(), v)).collect();
        write(&self.secrets).insert(key_of(Some(namespace), name), data);
    }

    pub fn add_config_map<K, V, I>(&self, namespace: &str, name: &str, data: I)
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let data = data.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        write(&self.config_maps).insert(key_of(Some(namespace), name), data);
    }

    fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
        lock.read()
            .map_err(|e| DirectoryError::Backend(format!("read lock poisoned: {}", e)))
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn key_of(namespace: Option<&str>, name: &str) -> ObjectKey {
    (
        namespace.unwrap_or(DEFAULT_NAMESPACE).to_string(),
        name.to_string(),
    )
}

/// Match a comma-separated list of `key=value` requirements
fn matches_selector(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .all(|req| match req.split_once('=') {
            Some((k, v)) => labels.get(k.trim()).map(String::as_str) == Some(v.trim()),
            None => labels.contains_key(req),
        })
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn list_ips(&self, namespace: &str, label_selector: &str) -> Result<Vec<Ip>> {
        let ips = Self::read_lock(&self.ips)?;
        Ok(ips
            .iter()
            .filter(|ip| ip.metadata.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE) == namespace)
            .filter(|ip| matches_selector(&ip.metadata.labels, label_selector))
            .cloned()
            .collect())
    }

    async fn get_inventory(&self, namespace: &str, name: &str) -> Result<Option<Inventory>> {
        let inventories = Self::read_lock(&self.inventories)?;
        Ok(inventories.get(&key_of(Some(namespace), name)).cloned())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
        let secrets = Self::read_lock(&self.secrets)?;
        Ok(secrets.get(&key_of(Some(namespace), name)).cloned())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let config_maps = Self::read_lock(&self.config_maps)?;
        Ok(config_maps.get(&key_of(Some(namespace), name)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matching() {
        let labels = BTreeMap::from([
            ("ip".to_string(), "10.0.0.5".to_string()),
            ("mac".to_string(), "aabbccddeeff".to_string()),
        ]);
        assert!(matches_selector(&labels, "ip=10.0.0.5"));
        assert!(matches_selector(&labels, "ip=10.0.0.5,mac=aabbccddeeff"));
        assert!(matches_selector(&labels, "mac"));
        assert!(!matches_selector(&labels, "ip=10.0.0.6"));
        assert!(!matches_selector(&labels, "zone"));
    }

    #[tokio::test]
    async fn test_inventory_replaced() {
        let dir = MemoryDirectory::new();
        dir.add_inventory(Inventory::new("m1").in_namespace("inv"));
        assert_eq!(
            dir.get_inventory("inv", "m1").await.unwrap().unwrap().system_id(),
            None
        );

        dir.add_inventory(Inventory::new("m1").in_namespace("inv").with_system_id("m1"));
        assert_eq!(
            dir.get_inventory("inv", "m1").await.unwrap().unwrap().system_id(),
            Some("m1")
        );
        assert!(dir.get_inventory("default", "m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_fixture() {
        let fixture = r##"
ips:
  - metadata:
      name: ip-1
      namespace: metal
      labels:
        ip: 10.0.0.5
        mac: aabbccddeeff
inventories:
  - metadata:
      name: f2175eb4-e203-11ec-b5d5-3a68dd76b473
      namespace: metal
      labels:
        metal.ironcore.dev/mac-address-aabbccddeeff: ""
    spec:
      system:
        id: f2175eb4-e203-11ec-b5d5-3a68dd76b473
secrets:
  - name: ipxe-f2175eb4-e203-11ec-b5d5-3a68dd76b473
    namespace: metal
    data:
      ignition-default: |
        variant: fcos
        version: 1.4.0
configMaps:
  - name: ipxe-f2175eb4-e203-11ec-b5d5-3a68dd76b473
    data:
      boot: "#!ipxe\n"
"##;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.yaml");
        std::fs::write(&path, fixture).unwrap();

        let directory = MemoryDirectory::load(&path).unwrap();

        let ips = directory.list_ips("metal", "ip=10.0.0.5").await.unwrap();
        assert_eq!(ips.len(), 1);

        let inv = directory
            .get_inventory("metal", "f2175eb4-e203-11ec-b5d5-3a68dd76b473")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inv.bound_macs(), vec!["aa:bb:cc:dd:ee:ff".to_string()]);

        let secret = directory
            .get_secret("metal", "ipxe-f2175eb4-e203-11ec-b5d5-3a68dd76b473")
            .await
            .unwrap()
            .unwrap();
        assert!(secret["ignition-default"].starts_with(b"variant: fcos"));

        let cm = directory
            .get_config_map("default", "ipxe-f2175eb4-e203-11ec-b5d5-3a68dd76b473")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cm["boot"], "#!ipxe\n");
    }

    #[test]
    fn test_load_missing_fixture() {
        assert!(matches!(
            MemoryDirectory::load("/nonexistent/directory.yaml"),
            Err(DirectoryError::Backend(_))
        ));
    }
}
