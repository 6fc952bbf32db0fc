//! Request errors
//!
//! Every failure ends the request with `500 Internal Server Error` and a
//! short plain-text reason. Details go to the log only.

use crate::assets::AssetError;
use crate::binding::BindingViolation;
use crate::client_ip::ClientAddressError;
use crate::directory::DirectoryError;
use crate::render::TemplateError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bootward_ignition::TranslateError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    ClientAddress(#[from] ClientAddressError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Binding(#[from] BindingViolation),

    /// Established machine without the requested part
    #[error("part {part} not found for {uuid}")]
    AssetNotFound { uuid: String, part: String },

    /// Provisioning path without an installed default
    #[error("default part {0} is not installed")]
    DefaultAssetMissing(String),

    #[error("no bootstrap kubeconfig for {0}")]
    CredentialMissing(String),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

impl BootError {
    /// Reason shown to the client
    pub fn public_reason(&self) -> &'static str {
        match self {
            BootError::ClientAddress(_) | BootError::Directory(_) | BootError::Binding(_) => {
                "Internal Error"
            }
            BootError::AssetNotFound { .. } => "Key not found",
            BootError::DefaultAssetMissing(_) | BootError::Asset(_) => "no data found",
            BootError::CredentialMissing(_) => "Error in ignition reading",
            BootError::Template(_) => "Error in template rendering",
            BootError::Translate(_) => "Error in ignition rendering",
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for BootError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self.public_reason()),
        )
            .into_response()
    }
}
