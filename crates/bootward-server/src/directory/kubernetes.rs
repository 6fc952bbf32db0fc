//! Kubernetes directory backend
//!
//! `IP` and `Inventory` are custom resources without generated bindings, so
//! they are read as `DynamicObject`s and decoded into the bootward-crd types.
//! Secrets and config maps use the typed k8s-openapi structs.

use super::{Directory, DirectoryError, Result};
use async_trait::async_trait;
use bootward_crd::{Inventory, Ip};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, ListParams};
use kube::core::{ApiResource, DynamicObject};
use kube::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Directory backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeDirectory {
    client: Client,
}

impl KubeDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| DirectoryError::Backend(format!("failed to create Kubernetes client: {}", e)))?;
        info!("Kubernetes client initialized");
        Ok(Self::new(client))
    }

    fn ip_resource() -> ApiResource {
        ApiResource {
            group: "ipam.metal.ironcore.dev".to_string(),
            version: "v1alpha1".to_string(),
            api_version: bootward_crd::IPAM_API_VERSION.to_string(),
            kind: "IP".to_string(),
            plural: "ips".to_string(),
        }
    }

    fn inventory_resource() -> ApiResource {
        ApiResource {
            group: "metal.ironcore.dev".to_string(),
            version: "v1alpha4".to_string(),
            api_version: bootward_crd::INVENTORY_API_VERSION.to_string(),
            kind: "Inventory".to_string(),
            plural: "inventories".to_string(),
        }
    }
}

fn backend(err: kube::Error) -> DirectoryError {
    DirectoryError::Backend(err.to_string())
}

/// Decode a dynamic object into one of the bootward-crd types
fn decode<T: DeserializeOwned>(kind: &'static str, obj: DynamicObject) -> Result<T> {
    let name = obj.metadata.name.clone().unwrap_or_default();
    let value = serde_json::to_value(&obj).map_err(|e| DirectoryError::Decode {
        kind,
        name: name.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_value(value).map_err(|e| DirectoryError::Decode {
        kind,
        name,
        reason: e.to_string(),
    })
}

#[async_trait]
impl Directory for KubeDirectory {
    async fn list_ips(&self, namespace: &str, label_selector: &str) -> Result<Vec<Ip>> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &Self::ip_resource());
        let list = api
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(backend)?;

        debug!(namespace, label_selector, count = list.items.len(), "Listed IPAM addresses");
        list.items.into_iter().map(|obj| decode("IP", obj)).collect()
    }

    async fn get_inventory(&self, namespace: &str, name: &str) -> Result<Option<Inventory>> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &Self::inventory_resource());
        api.get_opt(name)
            .await
            .map_err(backend)?
            .map(|obj| decode("Inventory", obj))
            .transpose()
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await.map_err(backend)?;

        Ok(secret.map(|s| {
            let mut data: BTreeMap<String, Vec<u8>> = s
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect();
            // stringData is write-only on a live cluster but shows up in
            // objects that were never round-tripped through the API server
            for (k, v) in s.string_data.unwrap_or_default() {
                data.entry(k).or_insert_with(|| v.into_bytes());
            }
            data
        }))
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api.get_opt(name).await.map_err(backend)?;
        Ok(config_map.map(|cm| cm.data.unwrap_or_default()))
    }
}
