//! Service configuration
//!
//! Loaded once at startup from a YAML file with kebab-case keys. A missing
//! file is not fatal: every namespace then falls back to the namespace the
//! pod runs in. A file that exists but does not parse is.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ipxe-service/config.yaml";
pub const DEFAULT_SECRET_PATH: &str = "/etc/ipxe-default-secret";
pub const DEFAULT_CONFIGMAP_PATH: &str = "/etc/ipxe-default-cm";
pub const DEFAULT_EVENT_HANDLER_URL: &str = "http://localhost:8088/api/v1/event";
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const IN_CLUSTER_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

const ENV_SECRET_PATH: &str = "IPXE_DEFAULT_SECRET_PATH";
const ENV_CONFIGMAP_PATH: &str = "IPXE_DEFAULT_CONFIGMAP_PATH";
const ENV_HANDLER_URL: &str = "HANDLER_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Namespace of the per-machine `ipxe-<uuid>` secrets and config maps
    pub configmap_namespace: String,
    /// Namespace of the IPAM `IP` objects
    pub ipam_namespace: String,
    /// Namespace of `Inventory` objects and bootstrap kubeconfig secrets
    pub inventory_namespace: String,
    /// Ignore `X-Forwarded-For` and use the peer address only
    pub disable_forward_header: bool,
    pub listen_address: SocketAddr,
    pub default_secret_path: PathBuf,
    pub default_configmap_path: PathBuf,
    /// Audit event endpoint; empty disables audit posting
    pub event_handler_url: String,
    pub token_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            configmap_namespace: String::new(),
            ipam_namespace: String::new(),
            inventory_namespace: String::new(),
            disable_forward_header: false,
            listen_address: SocketAddr::from(([0, 0, 0, 0], 8082)),
            default_secret_path: PathBuf::from(DEFAULT_SECRET_PATH),
            default_configmap_path: PathBuf::from(DEFAULT_CONFIGMAP_PATH),
            event_handler_url: DEFAULT_EVENT_HANDLER_URL.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
        }
    }
}

impl Config {
    /// Load the configuration file, apply environment overrides and fill
    /// unset namespaces.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) => {
                warn!("Can not read config {}: {}", path.display(), e);
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.fill_namespaces(&in_cluster_namespace(Path::new(IN_CLUSTER_NAMESPACE_PATH)));
        config.validate()?;

        info!(
            configmap_namespace = %config.configmap_namespace,
            ipam_namespace = %config.ipam_namespace,
            inventory_namespace = %config.inventory_namespace,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty file deserializes as null
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(path) = set(ENV_SECRET_PATH) {
            self.default_secret_path = PathBuf::from(path);
        }
        if let Some(path) = set(ENV_CONFIGMAP_PATH) {
            self.default_configmap_path = PathBuf::from(path);
        }
        if let Some(url) = set(ENV_HANDLER_URL) {
            self.event_handler_url = url;
        }
    }

    /// Use `namespace` for every namespace left empty
    pub fn fill_namespaces(&mut self, namespace: &str) {
        for ns in [
            &mut self.configmap_namespace,
            &mut self.ipam_namespace,
            &mut self.inventory_namespace,
        ] {
            if ns.is_empty() {
                *ns = namespace.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.event_handler_url.is_empty()
            && !(self.event_handler_url.starts_with("http://")
                || self.event_handler_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "event-handler-url must be an http(s) URL, got {}",
                self.event_handler_url
            )));
        }
        Ok(())
    }
}

/// Namespace the pod runs in, or `default` outside a cluster
pub fn in_cluster_namespace(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| "default".to_string())
}
