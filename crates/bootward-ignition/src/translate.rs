//! Butane → Ignition translation

use crate::convert::Converter;
use crate::error::{Result, TranslateError};
use crate::variant::{IgnitionVersion, Variant};
use serde_json::{Map, Value as Json};
use serde_yaml::{Mapping, Value as Yaml};

/// Top-level sections carried into the Ignition document
const SECTIONS: &[&str] = &["ignition", "storage", "systemd", "passwd", "kernel_arguments"];

/// Butane sugar that expands into several Ignition sections
const SUGAR: &[&str] = &["boot_device", "grub"];

/// Options controlling translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Treat warnings as errors
    pub strict: bool,
    /// Pretty-print the output
    pub pretty: bool,
    /// Never gzip inline resources
    pub no_resource_auto_compression: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            strict: false,
            pretty: false,
            no_resource_auto_compression: true,
        }
    }
}

/// Non-fatal findings collected during translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub warnings: Vec<String>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Translated document and its report
#[derive(Debug, Clone)]
pub struct Translation {
    pub output: Vec<u8>,
    pub report: Report,
}

/// Something that turns a rendered provisioning document into Ignition JSON
pub trait Translator: Send + Sync {
    fn translate(&self, input: &[u8]) -> Result<Translation>;
}

/// Translator for Butane `fcos` and `flatcar` documents
#[derive(Debug, Clone, Default)]
pub struct ButaneTranslator {
    options: TranslateOptions,
}

impl ButaneTranslator {
    pub fn new(options: TranslateOptions) -> Self {
        Self { options }
    }
}

impl Translator for ButaneTranslator {
    fn translate(&self, input: &[u8]) -> Result<Translation> {
        let doc: Yaml = serde_yaml::from_slice(input)?;
        let root = match doc {
            Yaml::Mapping(map) => map,
            Yaml::Null => return Err(TranslateError::MissingField("variant".to_string())),
            _ => {
                return Err(TranslateError::InvalidValue {
                    path: "$".to_string(),
                    reason: "document must be a mapping".to_string(),
                })
            }
        };

        let variant = Variant::parse(string_field(&root, "variant")?)?;
        let version = variant.ignition_version(string_field(&root, "version")?)?;

        let converter = Converter::new(!self.options.no_resource_auto_compression, version);
        let mut report = Report::default();
        let mut out = Map::new();

        for (key, value) in &root {
            let Some(key) = key.as_str() else {
                return Err(TranslateError::InvalidValue {
                    path: "$".to_string(),
                    reason: "mapping keys must be strings".to_string(),
                });
            };
            let path = format!("$.{}", key);

            if key == "variant" || key == "version" {
                continue;
            }
            if SUGAR.contains(&key) {
                return Err(TranslateError::Unsupported {
                    path,
                    reason: format!("{} sugar is not supported", key),
                });
            }
            if !SECTIONS.contains(&key) {
                report.warnings.push(format!("{}: unused key", path));
                continue;
            }
            converter.check_field(&path, key)?;

            let converted = converter.value(value, &path)?;
            out.insert(crate::convert::snake_to_camel(key), converted);
        }

        set_ignition_version(&mut out, version)?;

        if self.options.strict && !report.is_empty() {
            return Err(TranslateError::Strict(report.warnings.join("; ")));
        }

        let json = Json::Object(out);
        let output = if self.options.pretty {
            serde_json::to_vec_pretty(&json)?
        } else {
            serde_json::to_vec(&json)?
        };

        Ok(Translation { output, report })
    }
}

fn string_field<'a>(root: &'a Mapping, field: &str) -> Result<&'a str> {
    match root.get(field) {
        None | Some(Yaml::Null) => Err(TranslateError::MissingField(field.to_string())),
        Some(value) => value.as_str().ok_or_else(|| TranslateError::InvalidValue {
            path: format!("$.{}", field),
            reason: "must be a string".to_string(),
        }),
    }
}

fn set_ignition_version(out: &mut Map<String, Json>, version: IgnitionVersion) -> Result<()> {
    let section = out
        .entry("ignition".to_string())
        .or_insert_with(|| Json::Object(Map::new()));

    if section.is_null() {
        *section = Json::Object(Map::new());
    }
    let Json::Object(section) = section else {
        return Err(TranslateError::InvalidValue {
            path: "$.ignition".to_string(),
            reason: "must be a mapping".to_string(),
        });
    };

    if section.contains_key("version") {
        return Err(TranslateError::InvalidValue {
            path: "$.ignition.version".to_string(),
            reason: "set from the Butane version".to_string(),
        });
    }
    section.insert("version".to_string(), Json::String(version.to_string()));
    Ok(())
}
