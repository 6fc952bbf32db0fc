//! Boot service
//!
//! Orchestrates one request end to end: caller MAC from its address, machine
//! record from the UUID, binding check, asset selection, rendering and, for
//! ignition, translation. Nothing is cached between requests.

use crate::binding::{resolve_mode, ServingMode};
use crate::directory::{DirectoryGateway, MachineRecord};
use crate::error::BootError;
use crate::events::{AuditEvent, AuditTrail, Reason};
use crate::metrics::RequestMetrics;
use crate::render::{RenderContext, TemplateRenderer};
use crate::selector::{ignition_part_key, AssetSelector, Selection};
use bootward_ignition::Translator;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default part served on `/ipxe`
pub const DEFAULT_IPXE_PART: &str = "ipxe";

/// Bytes returned to the caller plus what was learned about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub body: Vec<u8>,
    pub mac: Option<String>,
}

/// What a request resolved to before any asset is read
struct Resolution {
    mac: Option<String>,
    record: Option<MachineRecord>,
    mode: ServingMode,
}

#[derive(Clone)]
pub struct BootService {
    gateway: DirectoryGateway,
    selector: AssetSelector,
    renderer: TemplateRenderer,
    translator: Arc<dyn Translator>,
    audit: AuditTrail,
    metrics: Arc<dyn RequestMetrics>,
}

impl BootService {
    pub fn new(
        gateway: DirectoryGateway,
        selector: AssetSelector,
        translator: Arc<dyn Translator>,
        audit: AuditTrail,
        metrics: Arc<dyn RequestMetrics>,
    ) -> Self {
        Self {
            gateway,
            selector,
            renderer: TemplateRenderer::new(),
            translator,
            audit,
            metrics,
        }
    }

    /// The default `ipxe` part, verbatim
    pub async fn default_boot_script(&self) -> Result<Vec<u8>, BootError> {
        self.selector
            .defaults()
            .get(DEFAULT_IPXE_PART)
            .await?
            .ok_or_else(|| BootError::DefaultAssetMissing(DEFAULT_IPXE_PART.to_string()))
    }

    /// Boot script `part` for machine `uuid`.
    ///
    /// Provisioning parts are rendered; established parts are served as
    /// stored.
    pub async fn boot_script(&self, client_ip: &str, uuid: &str, part: &str) -> Result<Artifact, BootError> {
        let resolution = self.resolve(client_ip, uuid).await?;
        let selection = self.selector.select(&resolution.mode, uuid, part).await?;

        let body = match selection {
            Selection::Default(template) => {
                info!(client_ip, uuid, part, "Serving default boot script");
                let context = self.context(uuid, &resolution);
                self.renderer.render(&template, &context)?
            }
            Selection::Established(script) => {
                info!(client_ip, uuid, part, "Generate iPXE config");
                self.audit
                    .record(AuditEvent::new(
                        uuid,
                        Reason::Generate,
                        format!("Generate iPXE config for client {}", client_ip),
                    ))
                    .await;
                script
            }
        };

        Ok(Artifact {
            body,
            mac: resolution.mac,
        })
    }

    /// Ignition document `part` for machine `uuid`.
    ///
    /// The stored part is always rendered then translated. Provisioning
    /// machines additionally receive their bootstrap kubeconfig.
    pub async fn ignition(&self, client_ip: &str, uuid: &str, part: &str) -> Result<Artifact, BootError> {
        let resolution = self.resolve(client_ip, uuid).await?;
        let key = ignition_part_key(part);
        let selection = self.selector.select(&resolution.mode, uuid, &key).await?;

        let mut context = self.context(uuid, &resolution);
        let source = match selection {
            Selection::Default(source) => {
                info!(client_ip, uuid, part = %key, "Rendering default ignition");
                let kubeconfig = self
                    .gateway
                    .bootstrap_credential(uuid)
                    .await?
                    .ok_or_else(|| BootError::CredentialMissing(uuid.to_string()))?;
                context = context.with_kubeconfig(String::from_utf8_lossy(&kubeconfig));
                source
            }
            Selection::Established(source) => {
                info!(client_ip, uuid, part = %key, "Rendering machine ignition");
                self.audit
                    .record(AuditEvent::new(
                        uuid,
                        Reason::Ignition,
                        format!("Render ignition ipxe-{} for client {}", uuid, client_ip),
                    ))
                    .await;
                source
            }
        };

        let rendered = self.renderer.render(&source, &context)?;
        let translation = self.translator.translate(&rendered)?;
        for warning in &translation.report.warnings {
            warn!(uuid, part = %key, "Ignition translation: {}", warning);
        }

        Ok(Artifact {
            body: translation.output,
            mac: resolution.mac,
        })
    }

    async fn resolve(&self, client_ip: &str, uuid: &str) -> Result<Resolution, BootError> {
        let mac = self.gateway.mac_for_ip(client_ip).await?;
        let record = self.gateway.machine_record(uuid).await?;

        match resolve_mode(uuid, record.as_ref(), mac.as_deref()) {
            Ok(mode) => Ok(Resolution { mac, record, mode }),
            Err(violation) => {
                let claimed = mac.as_deref().unwrap_or("unknown");
                let inventory = record.as_ref().map(|r| r.name.as_str()).unwrap_or_default();
                error!(
                    security = true,
                    client_ip,
                    uuid,
                    inventory,
                    mac = claimed,
                    "MAC does not match the machine requested by the client"
                );
                self.metrics.record_binding_violation();
                self.audit
                    .record(AuditEvent::new(
                        uuid,
                        Reason::Denied,
                        format!(
                            "Denied client {} because mac '{}' does not match for inventory",
                            client_ip, claimed
                        ),
                    ))
                    .await;
                Err(violation.into())
            }
        }
    }

    fn context(&self, uuid: &str, resolution: &Resolution) -> RenderContext {
        RenderContext::new(uuid, resolution.mac.as_deref()).with_hostname(
            resolution
                .record
                .as_ref()
                .and_then(|r| r.hostname.as_deref()),
        )
    }
}
