//! Client address extraction
//!
//! The directory indexes addresses in canonical form, so whatever the
//! request carries is normalized before it is used as a lookup key.

use crate::error::BootError;
use crate::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use bootward_crd::canonical_ip;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Error, PartialEq)]
pub enum ClientAddressError {
    #[error("malformed client address: {0}")]
    Malformed(String),

    #[error("forwarding header is not valid text")]
    InvalidHeader,

    #[error("no client address available")]
    Unavailable,
}

/// Canonical address of the requesting client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = BootError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let forwarded = if state.config.disable_forward_header {
            None
        } else {
            parts
                .headers
                .get(X_FORWARDED_FOR)
                .map(|v| v.to_str().map_err(|_| ClientAddressError::InvalidHeader))
                .transpose()?
        };
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientIp(resolve_client_ip(forwarded, peer)?))
    }
}

/// Pick the client address from the forwarding header or the peer.
///
/// The header wins when it carries a non-empty first entry. Pass `None` for
/// `forwarded` when the header must not be trusted. A dual-stack listener
/// reports IPv4 peers as IPv4-mapped IPv6, so only the peer is unmapped.
pub fn resolve_client_ip(
    forwarded: Option<&str>,
    peer: Option<SocketAddr>,
) -> Result<String, ClientAddressError> {
    let first = forwarded
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(addr) = first {
        return normalize_ip(addr);
    }

    peer.map(|p| canonical_ip(&p.ip().to_canonical()))
        .ok_or(ClientAddressError::Unavailable)
}

/// Parse and canonicalize an address.
///
/// IPv6 addresses, IPv4-mapped ones included, are expanded to eight
/// zero-padded groups.
pub fn normalize_ip(addr: &str) -> Result<String, ClientAddressError> {
    let parsed: IpAddr = addr
        .trim()
        .parse()
        .map_err(|_| ClientAddressError::Malformed(addr.to_string()))?;
    Ok(canonical_ip(&parsed))
}
