//! Error types for directory resources

use thiserror::Error;

/// Errors that can occur when working with directory resources
#[derive(Debug, Error)]
pub enum CrdError {
    /// Invalid MAC address format
    #[error("Invalid MAC address format: {0}")]
    InvalidMacAddress(String),
}

/// Result type for directory resource operations
pub type Result<T> = std::result::Result<T, CrdError>;
