//! Binding validation
//!
//! A provisioned machine is only served to the MAC bound to it. The MAC is
//! derived from the caller's address, never taken from the request, so a
//! client asking for another machine's UUID is refused.

use crate::directory::MachineRecord;
use thiserror::Error;

/// Serving mode decided for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServingMode {
    /// No identity assigned yet: serve defaults
    Provisioning,
    /// Identity assigned and the caller's MAC is bound to it
    Established,
}

/// The caller's MAC is not bound to the requested machine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("MAC ({claimed}) does not match the MACs bound to {uuid}")]
pub struct BindingViolation {
    pub uuid: String,
    pub claimed: String,
}

/// Decide the serving mode for `uuid`.
///
/// A missing record or a record without identity means provisioning. A
/// record with an identity requires `claimed_mac` to be one of its bound
/// MACs; an unknown caller (`None`) never matches.
pub fn resolve_mode(
    uuid: &str,
    record: Option<&MachineRecord>,
    claimed_mac: Option<&str>,
) -> Result<ServingMode, BindingViolation> {
    let Some(record) = record.filter(|r| r.identity.is_some()) else {
        return Ok(ServingMode::Provisioning);
    };

    match claimed_mac {
        Some(mac) if record.bound_macs.iter().any(|b| b == mac) => Ok(ServingMode::Established),
        _ => Err(BindingViolation {
            uuid: uuid.to_string(),
            claimed: claimed_mac.unwrap_or("unknown").to_string(),
        }),
    }
}
