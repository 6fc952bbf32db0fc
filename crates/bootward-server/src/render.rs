//! Template rendering
//!
//! Assets are Jinja templates expanded against the machine's identity. The
//! environment has no loader, so templates cannot include files, and
//! undefined variables are errors rather than empty strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is not valid UTF-8")]
    NotUtf8,

    #[error("template parse error: {0}")]
    Parse(#[source] Error),

    #[error("template render error: {0}")]
    Render(#[source] Error),
}

/// Values a template may reference
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RenderContext {
    pub uuid: String,
    /// Caller's MAC; empty when the caller is unknown
    pub mac: String,
    pub hostname: String,
    /// Bootstrap kubeconfig, only set on the provisioning ignition path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
}

impl RenderContext {
    /// Context for `uuid`; the hostname defaults to the uuid
    pub fn new(uuid: impl Into<String>, mac: Option<&str>) -> Self {
        let uuid = uuid.into();
        Self {
            hostname: uuid.clone(),
            uuid,
            mac: mac.unwrap_or_default().to_string(),
            kubeconfig: None,
        }
    }

    pub fn with_hostname(mut self, hostname: Option<&str>) -> Self {
        if let Some(name) = hostname.filter(|h| !h.is_empty()) {
            self.hostname = name.to_string();
        }
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<String>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, source: &[u8], context: &RenderContext) -> Result<Vec<u8>, TemplateError> {
        let source = std::str::from_utf8(source).map_err(|_| TemplateError::NotUtf8)?;
        let env = environment();
        let template = env.template_from_str(source).map_err(TemplateError::Parse)?;
        let rendered = template.render(context).map_err(TemplateError::Render)?;
        Ok(rendered.into_bytes())
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);

    env.add_filter("b64encode", |value: String| -> String { STANDARD.encode(value) });
    env.add_filter("b64decode", |value: String| -> Result<String, Error> {
        let bytes = STANDARD.decode(value.trim()).map_err(|e| {
            Error::new(ErrorKind::InvalidOperation, format!("invalid base64: {}", e))
        })?;
        String::from_utf8(bytes).map_err(|_| {
            Error::new(ErrorKind::InvalidOperation, "decoded base64 is not UTF-8")
        })
    });
    env.add_filter("sha256sum", |value: String| -> String {
        Sha256::digest(value.as_bytes())
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    });
    env.add_filter("quote", |value: String| -> String {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    });

    env
}
