//! YAML to JSON conversion
//!
//! Butane spells keys in snake_case, Ignition in camelCase; otherwise the
//! two documents share their structure. Resources given as `inline` text are
//! turned into `data:` URLs in the `source` field. Butane-only fields that
//! would need expanding into other sections, and fields the target Ignition
//! version lacks, are rejected rather than passed through.

use crate::error::{Result, TranslateError};
use crate::variant::IgnitionVersion;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{Map, Number, Value as Json};
use serde_yaml::{Mapping, Value as Yaml};
use std::io::Write;

/// Convert a snake_case key to camelCase
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// A `data:` URL plus the compression applied to its payload
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub source: String,
    pub compression: Option<&'static str>,
}

/// Encode bytes as a `data:` URL.
///
/// The payload is percent-encoded or base64-encoded, whichever is shorter.
/// With `compress` set, it is gzipped and base64-encoded when that yields a
/// shorter URL still.
pub fn data_url(data: &[u8], compress: bool) -> Result<DataUrl> {
    let escaped = format!("data:,{}", urlencoding::encode_binary(data));
    let encoded = format!(
        "data:;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(data)
    );
    let plain = if encoded.len() < escaped.len() {
        encoded
    } else {
        escaped
    };
    if !compress {
        return Ok(DataUrl {
            source: plain,
            compression: None,
        });
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    let gz = encoder.finish()?;
    let packed = format!(
        "data:;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(gz)
    );

    if packed.len() < plain.len() {
        Ok(DataUrl {
            source: packed,
            compression: Some("gzip"),
        })
    } else {
        Ok(DataUrl {
            source: plain,
            compression: None,
        })
    }
}

/// Recursive YAML → Ignition JSON converter for one target version
#[derive(Debug, Clone, Copy)]
pub struct Converter {
    compress: bool,
    version: IgnitionVersion,
}

impl Converter {
    pub fn new(compress: bool, version: IgnitionVersion) -> Self {
        Self { compress, version }
    }

    /// Reject `key` at `path` when it has no Ignition equivalent in the
    /// target version
    pub fn check_field(&self, path: &str, key: &str) -> Result<()> {
        let unsupported = |reason: String| {
            Err(TranslateError::Unsupported {
                path: path.to_string(),
                reason,
            })
        };

        if key == "local" || key.ends_with("_local") {
            return unsupported("local file references need a files directory".to_string());
        }

        let schema = schema_path(path);
        if schema == "$.storage.trees" {
            return unsupported("local file references need a files directory".to_string());
        }
        match IgnitionVersion::introducing(&schema, key) {
            Some(since) if self.version < since => unsupported(format!(
                "needs Ignition {} or later, document targets {}",
                since, self.version
            )),
            _ => Ok(()),
        }
    }

    /// Convert a value found at `path` (JSONPath-like, for error messages)
    pub fn value(&self, value: &Yaml, path: &str) -> Result<Json> {
        match value {
            Yaml::Null => Ok(Json::Null),
            Yaml::Bool(b) => Ok(Json::Bool(*b)),
            Yaml::Number(n) => number(n, path),
            Yaml::String(s) => Ok(Json::String(s.clone())),
            Yaml::Sequence(seq) => seq
                .iter()
                .enumerate()
                .map(|(i, v)| self.value(v, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(Json::Array),
            Yaml::Mapping(map) => self.mapping(map, path),
            Yaml::Tagged(tagged) => Err(TranslateError::Unsupported {
                path: path.to_string(),
                reason: format!("YAML tag {}", tagged.tag),
            }),
        }
    }

    fn mapping(&self, map: &Mapping, path: &str) -> Result<Json> {
        let mut out = Map::new();

        for (key, value) in map {
            let key = key.as_str().ok_or_else(|| TranslateError::InvalidValue {
                path: path.to_string(),
                reason: "mapping keys must be strings".to_string(),
            })?;
            let child = format!("{}.{}", path, key);
            self.check_field(&child, key)?;

            match key {
                "with_mount_unit" => match value {
                    Yaml::Null | Yaml::Bool(false) => {}
                    _ => {
                        return Err(TranslateError::Unsupported {
                            path: child,
                            reason: "generating mount units is not supported".to_string(),
                        });
                    }
                },
                "inline" => {
                    if map.contains_key("source") {
                        return Err(TranslateError::InvalidValue {
                            path: child,
                            reason: "inline and source are mutually exclusive".to_string(),
                        });
                    }
                    let text = value.as_str().ok_or_else(|| TranslateError::InvalidValue {
                        path: child.clone(),
                        reason: "inline must be a string".to_string(),
                    })?;
                    let url = data_url(text.as_bytes(), self.compress)?;
                    out.insert("source".to_string(), Json::String(url.source));
                    if let Some(compression) = url.compression {
                        out.insert(
                            "compression".to_string(),
                            Json::String(compression.to_string()),
                        );
                    }
                }
                "mode" => {
                    out.insert("mode".to_string(), mode(value, &child)?);
                }
                _ => {
                    out.insert(snake_to_camel(key), self.value(value, &child)?);
                }
            }
        }

        Ok(Json::Object(out))
    }
}

/// `$.storage.files[0].contents` → `$.storage.files.contents`
fn schema_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut in_index = false;
    for c in path.chars() {
        match c {
            '[' => in_index = true,
            ']' => in_index = false,
            _ if !in_index => out.push(c),
            _ => {}
        }
    }
    out
}

fn number(n: &serde_yaml::Number, path: &str) -> Result<Json> {
    if let Some(u) = n.as_u64() {
        Ok(Json::from(u))
    } else if let Some(i) = n.as_i64() {
        Ok(Json::from(i))
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Json::Number)
            .ok_or_else(|| TranslateError::InvalidValue {
                path: path.to_string(),
                reason: format!("unrepresentable number {}", n),
            })
    }
}

/// File modes are commonly written in octal (`0644`); Ignition wants decimal.
fn mode(value: &Yaml, path: &str) -> Result<Json> {
    let invalid = || TranslateError::InvalidValue {
        path: path.to_string(),
        reason: "mode must be an integer".to_string(),
    };

    match value {
        Yaml::Null => Ok(Json::Null),
        Yaml::Number(n) => n.as_u64().map(Json::from).ok_or_else(invalid),
        Yaml::String(s) => {
            let digits = s.strip_prefix("0o").unwrap_or(s);
            if s.starts_with('0') {
                u64::from_str_radix(digits, 8)
                    .map(Json::from)
                    .map_err(|_| invalid())
            } else {
                s.parse::<u64>().map(Json::from).map_err(|_| invalid())
            }
        }
        _ => Err(invalid()),
    }
}
