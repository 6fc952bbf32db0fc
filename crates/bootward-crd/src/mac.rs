//! MAC and IP key helpers
//!
//! The directory stores addresses as label values, which may not contain
//! `:`. These helpers convert between the wire forms and the canonical
//! forms used for comparison.

use crate::{CrdError, Result};
use std::net::IpAddr;

/// Normalize a MAC address to lowercase colon form (`aa:bb:cc:dd:ee:ff`).
///
/// Accepts colon, dash, Cisco dot (`aabb.ccdd.eeff`) and bare hex forms.
pub fn normalize_mac(mac: &str) -> Result<String> {
    let hex: String = mac
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CrdError::InvalidMacAddress(mac.to_string()));
    }

    let hex = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

/// Render an address in the form the directory indexes it by.
///
/// IPv6 addresses are expanded to eight zero-padded groups with no `::`
/// compression; IPv4 addresses are left unchanged.
pub fn canonical_ip(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => v6
            .segments()
            .iter()
            .map(|s| format!("{:04x}", s))
            .collect::<Vec<_>>()
            .join(":"),
    }
}

/// Label value for an address (`:` replaced by `_`)
pub fn ip_label_value(canonical_ip: &str) -> String {
    canonical_ip.replace(':', "_")
}
