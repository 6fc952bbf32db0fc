//! Bootward Directory Types
//!
//! This crate provides serde types for the resources the boot service reads
//! from its directory (a Kubernetes API server in production).
//!
//! # Resources
//!
//! - `Ip` - IPAM address objects, labelled with the address and its MAC
//! - `Inventory` - Physical machine records, keyed by machine UUID
//!
//! # Keys
//!
//! Label values cannot contain `:`, so addresses and MACs are stored in a
//! flattened form. Use [`canonical_ip`] and [`ip_label_value`] to build
//! lookup keys and [`normalize_mac`] to compare MACs.

pub mod error;
pub mod inventory;
pub mod ip;
pub mod mac;
pub mod metadata;

pub use error::*;
pub use inventory::*;
pub use ip::*;
pub use mac::*;
pub use metadata::*;

/// API version of IPAM resources
pub const IPAM_API_VERSION: &str = "ipam.metal.ironcore.dev/v1alpha1";

/// API version of inventory resources
pub const INVENTORY_API_VERSION: &str = "metal.ironcore.dev/v1alpha4";

/// Label prefix declaring a MAC address bound to an inventory
pub const INVENTORY_MAC_LABEL_PREFIX: &str = "metal.ironcore.dev/mac-address-";
