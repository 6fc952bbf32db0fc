//! Butane variants and the Ignition spec versions they produce

use crate::error::{Result, TranslateError};
use std::fmt;

/// Supported Butane variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Fedora CoreOS
    Fcos,
    /// Flatcar Container Linux
    Flatcar,
}

impl Variant {
    /// Parse the `variant` field
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "fcos" => Ok(Variant::Fcos),
            "flatcar" => Ok(Variant::Flatcar),
            other => Err(TranslateError::UnsupportedVariant(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Fcos => "fcos",
            Variant::Flatcar => "flatcar",
        }
    }

    fn versions(&self) -> &'static [(&'static str, IgnitionVersion)] {
        match self {
            Variant::Fcos => &[
                ("1.0.0", IgnitionVersion(3, 0)),
                ("1.1.0", IgnitionVersion(3, 1)),
                ("1.2.0", IgnitionVersion(3, 2)),
                ("1.3.0", IgnitionVersion(3, 2)),
                ("1.4.0", IgnitionVersion(3, 3)),
                ("1.5.0", IgnitionVersion(3, 4)),
                ("1.6.0", IgnitionVersion(3, 5)),
            ],
            Variant::Flatcar => &[
                ("1.0.0", IgnitionVersion(3, 3)),
                ("1.1.0", IgnitionVersion(3, 4)),
            ],
        }
    }

    /// Ignition spec version produced for a Butane `version`
    pub fn ignition_version(&self, version: &str) -> Result<IgnitionVersion> {
        self.versions()
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, ign)| *ign)
            .ok_or_else(|| TranslateError::UnsupportedVersion {
                variant: self.as_str().to_string(),
                version: version.to_string(),
            })
    }
}

/// Ignition spec version (major, minor); patch is always 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IgnitionVersion(pub u8, pub u8);

/// Fields added after Ignition 3.0.0, by Butane path without sequence indexes
const FIELDS_SINCE: &[(&str, IgnitionVersion)] = &[
    ("$.ignition.proxy", IgnitionVersion(3, 1)),
    ("$.storage.filesystems.mount_options", IgnitionVersion(3, 1)),
    ("$.kernel_arguments", IgnitionVersion(3, 2)),
    ("$.storage.luks", IgnitionVersion(3, 2)),
    ("$.storage.disks.partitions.resize", IgnitionVersion(3, 2)),
    ("$.passwd.users.should_exist", IgnitionVersion(3, 2)),
    ("$.passwd.groups.should_exist", IgnitionVersion(3, 2)),
    ("$.storage.luks.discard", IgnitionVersion(3, 4)),
    ("$.storage.luks.open_options", IgnitionVersion(3, 4)),
];

/// Resource keys added after Ignition 3.0.0, wherever they appear
const KEYS_SINCE: &[(&str, IgnitionVersion)] = &[("http_headers", IgnitionVersion(3, 1))];

impl IgnitionVersion {
    /// First spec version that has `key` at `path`.
    ///
    /// `path` is the Butane path of the field with sequence indexes removed
    /// (`$.storage.luks`, not `$.storage.luks[0]`). `None` means the field
    /// exists in every 3.x version.
    pub fn introducing(path: &str, key: &str) -> Option<IgnitionVersion> {
        FIELDS_SINCE
            .iter()
            .find(|(p, _)| *p == path)
            .or_else(|| KEYS_SINCE.iter().find(|(k, _)| *k == key))
            .map(|(_, version)| *version)
    }
}

impl fmt::Display for IgnitionVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.0", self.0, self.1)
    }
}
