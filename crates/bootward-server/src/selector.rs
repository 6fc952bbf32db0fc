//! Asset selection
//!
//! Provisioning requests are served from the default asset set only;
//! established requests from the machine's own assets only. Neither side
//! falls back to the other.

use crate::assets::DefaultAssetSet;
use crate::binding::ServingMode;
use crate::directory::DirectoryGateway;
use crate::error::BootError;
use tracing::debug;

/// Prefix keeping ignition parts apart from boot script parts
pub const IGNITION_PART_PREFIX: &str = "ignition-";

/// Key an ignition part is stored under
pub fn ignition_part_key(part: &str) -> String {
    format!("{}{}", IGNITION_PART_PREFIX, part)
}

/// Raw asset chosen for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Default(Vec<u8>),
    Established(Vec<u8>),
}

impl Selection {
}

#[derive(Clone)]
pub struct AssetSelector {
    gateway: DirectoryGateway,
    defaults: DefaultAssetSet,
}

impl AssetSelector {
    pub fn new(gateway: DirectoryGateway, defaults: DefaultAssetSet) -> Self {
        Self { gateway, defaults }
    }

    pub fn defaults(&self) -> &DefaultAssetSet {
        &self.defaults
    }

    pub async fn select(&self, mode: &ServingMode, uuid: &str, key: &str) -> Result<Selection, BootError> {
        match mode {
            ServingMode::Provisioning => {
                debug!(uuid, part = key, "Selecting default part");
                self.defaults
                    .get(key)
                    .await?
                    .map(Selection::Default)
                    .ok_or_else(|| BootError::DefaultAssetMissing(key.to_string()))
            }
            ServingMode::Established => {
                debug!(uuid, part = key, "Selecting machine part");
                self.gateway
                    .asset_part(uuid, key)
                    .await?
                    .map(Selection::Established)
                    .ok_or_else(|| BootError::AssetNotFound {
                        uuid: uuid.to_string(),
                        part: key.to_string(),
                    })
            }
        }
    }
}
