//! Error types for Butane translation

use thiserror::Error;

/// Error type for translation operations
#[derive(Debug, Error)]
pub enum TranslateError {
    /// Input is not valid YAML
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A required field is absent
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Unknown `variant`
    #[error("unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Known variant, unknown `version`
    #[error("unsupported {variant} version: {version}")]
    UnsupportedVersion { variant: String, version: String },

    /// Valid Butane that this translator cannot express
    #[error("unsupported at {path}: {reason}")]
    Unsupported { path: String, reason: String },

    /// Malformed field value
    #[error("invalid value at {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    /// Warnings were raised in strict mode
    #[error("strict mode: {0}")]
    Strict(String),

    /// Output serialization failed
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Resource compression failed
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslateError>;
