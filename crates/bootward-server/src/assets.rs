//! Default asset set
//!
//! Two directories of flat files, one per part, mounted from a secret and a
//! config map. The secret tier shadows the config map tier. Files are read
//! on every request; picking up new content means restarting the process.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid part name: {0:?}")]
    InvalidPart(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// True for names made of `[a-z0-9-]`
pub fn is_valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAssetSet {
    secret_dir: PathBuf,
    config_map_dir: PathBuf,
}

impl DefaultAssetSet {
    pub fn new(secret_dir: impl Into<PathBuf>, config_map_dir: impl Into<PathBuf>) -> Self {
        Self {
            secret_dir: secret_dir.into(),
            config_map_dir: config_map_dir.into(),
        }
    }

    /// Content of a default part, or `None` when neither tier has it.
    ///
    /// An empty file in the secret tier does not shadow the config map tier.
    pub async fn get(&self, part: &str) -> Result<Option<Vec<u8>>, AssetError> {
        if !is_valid_part(part) {
            return Err(AssetError::InvalidPart(part.to_string()));
        }

        for dir in [&self.secret_dir, &self.config_map_dir] {
            let path = dir.join(part);
            match tokio::fs::read(&path).await {
                Ok(data) if !data.is_empty() => {
                    debug!(path = %path.display(), "Serving default part");
                    return Ok(Some(data));
                }
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(AssetError::Read { path, source }),
            }
        }

        Ok(None)
    }
}
