//! Audit events
//!
//! Security-relevant and served-asset events are posted to an external
//! handler. Posting is best effort: a failure is logged and never fails the
//! request that triggered it.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EventError {
    #[error("failed to read token {path}: {source}")]
    Token {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("event request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("event handler returned {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reason {
    /// Caller's MAC is not bound to the requested machine
    Denied,
    /// Boot script served to an established machine
    Generate,
    /// Ignition served to an established machine
    Ignition,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::Denied => "Denied",
            Reason::Generate => "Generate",
            Reason::Ignition => "Ignition",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub uuid: String,
    pub reason: Reason,
    pub message: String,
}

impl AuditEvent {
    pub fn new(uuid: impl Into<String>, reason: Reason, message: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            reason,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn post(&self, event: &AuditEvent) -> Result<(), EventError>;
}

/// Posts events as JSON with the service account token as bearer
pub struct HttpEventSink {
    client: reqwest::Client,
    url: String,
    token_path: PathBuf,
}

impl HttpEventSink {
    pub fn new(url: impl Into<String>, token_path: impl Into<PathBuf>) -> Result<Self, EventError> {
        let client = reqwest::Client::builder().timeout(EVENT_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            token_path: token_path.into(),
        })
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn post(&self, event: &AuditEvent) -> Result<(), EventError> {
        // Tokens are rotated on disk, so read on every post
        let token = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|source| EventError::Token {
                path: self.token_path.clone(),
                source,
            })?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token.trim())
            .json(event)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EventError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Sink used when no handler is configured
pub struct DisabledEventSink;

#[async_trait]
impl EventSink for DisabledEventSink {
    async fn post(&self, event: &AuditEvent) -> Result<(), EventError> {
        debug!(uuid = %event.uuid, reason = %event.reason, "Audit posting disabled");
        Ok(())
    }
}

/// Records events through a sink, swallowing failures
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn EventSink>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledEventSink))
    }

    pub async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.sink.post(&event).await {
            warn!(uuid = %event.uuid, reason = %event.reason, error = %e, "Failed to post audit event");
        }
    }
}
