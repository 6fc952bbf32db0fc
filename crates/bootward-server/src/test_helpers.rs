//! Test helpers for bootward-server router tests
//!
//! Builds an `AppState` over a `MemoryDirectory`, temporary default asset
//! directories, a recording event sink and recording metrics.

use crate::events::{AuditEvent, AuditTrail, EventError, EventSink};
use crate::metrics::RequestMetrics;
use crate::{router, AppState, Config, Directory, MemoryDirectory};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use bootward_ignition::{ButaneTranslator, TranslateOptions};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const NAMESPACE: &str = "metal";

/// Event sink that keeps every posted event
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn post(&self, event: &AuditEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Metrics that remember what was recorded
#[derive(Default)]
pub struct RecordingMetrics {
    ipxe: Mutex<Vec<String>>,
    ignition: Mutex<Vec<String>>,
    violations: Mutex<u64>,
}

impl RecordingMetrics {
    /// Labels of recorded boot script durations
    pub fn ipxe(&self) -> Vec<String> {
        self.ipxe.lock().unwrap().clone()
    }

    /// Labels of recorded ignition durations
    pub fn ignition(&self) -> Vec<String> {
        self.ignition.lock().unwrap().clone()
    }

    pub fn violations(&self) -> u64 {
        *self.violations.lock().unwrap()
    }
}

impl RequestMetrics for RecordingMetrics {
    fn record_ipxe_duration(&self, uuid: &str, _duration: Duration) {
        self.ipxe.lock().unwrap().push(uuid.to_string());
    }

    fn record_ignition_duration(&self, mac: &str, _duration: Duration) {
        self.ignition.lock().unwrap().push(mac.to_string());
    }

    fn record_binding_violation(&self) {
        *self.violations.lock().unwrap() += 1;
    }
}

/// Which default asset directory to write to
pub enum Tier {
    Secret,
    ConfigMap,
}

pub struct TestEnv {
    pub directory: Arc<MemoryDirectory>,
    pub events: Arc<RecordingEventSink>,
    pub metrics: Arc<RecordingMetrics>,
    pub config: Config,
    secret_dir: TempDir,
    config_map_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let secret_dir = tempfile::tempdir().unwrap();
        let config_map_dir = tempfile::tempdir().unwrap();
        let config = Config {
            configmap_namespace: NAMESPACE.to_string(),
            ipam_namespace: NAMESPACE.to_string(),
            inventory_namespace: NAMESPACE.to_string(),
            default_secret_path: secret_dir.path().to_path_buf(),
            default_configmap_path: config_map_dir.path().to_path_buf(),
            event_handler_url: String::new(),
            ..Default::default()
        };

        Self {
            directory: Arc::new(MemoryDirectory::new()),
            events: Arc::new(RecordingEventSink::default()),
            metrics: Arc::new(RecordingMetrics::default()),
            config,
            secret_dir,
            config_map_dir,
        }
    }

    pub fn write_default(&self, tier: Tier, part: &str, content: &str) {
        let dir = match tier {
            Tier::Secret => self.secret_dir.path(),
            Tier::ConfigMap => self.config_map_dir.path(),
        };
        std::fs::write(dir.join(part), content).unwrap();
    }

    pub fn state(&self) -> AppState {
        let directory: Arc<dyn Directory> = self.directory.clone();
        AppState::with_parts(
            self.config.clone(),
            directory,
            Arc::new(ButaneTranslator::new(TranslateOptions::default())),
            AuditTrail::new(self.events.clone()),
            self.metrics.clone(),
        )
    }

    pub fn router(&self) -> axum::Router {
        router(self.state())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }
}

/// GET `uri` as if sent from `peer`, optionally through a proxy
pub async fn get(app: axum::Router, uri: &str, peer: &str, forwarded: Option<&str>) -> TestResponse {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut builder = Request::builder().uri(uri).extension(ConnectInfo(peer));
    if let Some(addr) = forwarded {
        builder = builder.header("X-Forwarded-For", addr);
    }

    let response = app
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Reason;
    use crate::metrics::PrometheusMetrics;
    use bootward_crd::{Inventory, Ip};
    use serde_json::Value;

    const UUID: &str = "f2175eb4-e203-11ec-b5d5-3a68dd76b473";
    const MAC: &str = "aa:bb:cc:dd:ee:ff";
    const CLIENT: &str = "10.0.0.5:4711";

    fn register_ip(env: &TestEnv, ip: &str, mac: &str) {
        let name = format!("ip-{}", ip.replace(['.', ':'], "-"));
        env.directory
            .add_ip(Ip::new(name, bootward_crd::ip_label_value(ip), mac.replace(':', "")).in_namespace(NAMESPACE));
    }

    fn unprovisioned(env: &TestEnv) {
        env.directory
            .add_inventory(Inventory::new(UUID).in_namespace(NAMESPACE));
    }

    fn provisioned(env: &TestEnv, bound_mac: &str) {
        env.directory.add_inventory(
            Inventory::new(UUID)
                .in_namespace(NAMESPACE)
                .with_system_id(UUID)
                .with_bound_mac(bound_mac),
        );
    }

    fn machine_assets(env: &TestEnv) -> String {
        format!("ipxe-{}", UUID)
    }

    #[tokio::test]
    async fn test_health() {
        let env = TestEnv::new();
        let response = get(env.router(), "/", "127.0.0.1:1", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "ok\n");
    }

    #[tokio::test]
    async fn test_default_ipxe_served_verbatim() {
        let env = TestEnv::new();
        let script = "#!ipxe\nchain http://boot/ipxe/${uuid}/boot?x={{ uuid }}\n";
        env.write_default(Tier::ConfigMap, "ipxe", script);

        let response = get(env.router(), "/ipxe", "127.0.0.1:5000", None).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), script);
        assert!(response.headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[tokio::test]
    async fn test_default_ipxe_missing() {
        let env = TestEnv::new();
        let response = get(env.router(), "/ipxe", "127.0.0.1:5000", None).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "no data found\n");
    }

    #[tokio::test]
    async fn test_unprovisioned_boot_is_rendered_default() {
        let env = TestEnv::new();
        env.write_default(Tier::Secret, "boot", "#!ipxe\nkernel http://boot/{{ uuid }}/vmlinuz\n");
        unprovisioned(&env);

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.text(),
            format!("#!ipxe\nkernel http://boot/{}/vmlinuz\n", UUID)
        );
        assert!(env.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_machine_is_provisioning() {
        let env = TestEnv::new();
        env.write_default(Tier::ConfigMap, "boot", "boot {{ uuid }} [{{ mac }}]");

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), format!("boot {} []", UUID));
    }

    #[tokio::test]
    async fn test_provisioned_ignition_is_translated() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", MAC);
        provisioned(&env, MAC);
        env.directory.add_secret(
            NAMESPACE,
            &machine_assets(&env),
            [(
                "ignition-default",
                b"variant: fcos\nversion: 1.4.0\npasswd:\n  users:\n    - name: core\n".to_vec(),
            )],
        );

        let uri = format!("/ignition/{}/default", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers["content-type"], "application/json");
        assert_eq!(
            response.text(),
            r#"{"ignition":{"version":"3.3.0"},"passwd":{"users":[{"name":"core"}]}}"#
        );

        let events = env.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, Reason::Ignition);
        assert_eq!(events[0].uuid, UUID);
        assert_eq!(env.metrics.ignition(), vec![MAC.to_string()]);
        assert_eq!(env.metrics.violations(), 0);
    }

    #[tokio::test]
    async fn test_binding_violation_is_rejected() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", "00:11:22:33:44:55");
        provisioned(&env, MAC);
        env.directory.add_config_map(
            NAMESPACE,
            &machine_assets(&env),
            [("boot", "#!ipxe\nsecret machine script\n")],
        );
        env.write_default(Tier::Secret, "boot", "#!ipxe\ndefault\n");

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "Internal Error\n");

        let events = env.events.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, Reason::Denied);
        assert!(events[0].message.contains("00:11:22:33:44:55"));
        assert_eq!(env.metrics.violations(), 1);
        assert_eq!(env.metrics.ipxe(), vec![UUID.to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_client_cannot_claim_provisioned_machine() {
        let env = TestEnv::new();
        provisioned(&env, MAC);
        env.directory
            .add_config_map(NAMESPACE, &machine_assets(&env), [("boot", "machine")]);

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(env.events.events()[0].reason, Reason::Denied);
        assert_eq!(env.metrics.violations(), 1);
    }

    #[tokio::test]
    async fn test_missing_established_part_does_not_fall_back() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", MAC);
        provisioned(&env, MAC);
        env.directory.add_secret(
            NAMESPACE,
            &machine_assets(&env),
            [("ignition-default", b"variant: fcos\nversion: 1.4.0\n".to_vec())],
        );
        env.write_default(
            Tier::Secret,
            "ignition-missingpart",
            "variant: fcos\nversion: 1.4.0\n",
        );

        let uri = format!("/ignition/{}/missingpart", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "Key not found\n");
    }

    #[tokio::test]
    async fn test_established_boot_script_verbatim() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", MAC);
        provisioned(&env, MAC);
        let script = "#!ipxe\nset x {{ not rendered }}\n";
        env.directory
            .add_config_map(NAMESPACE, &machine_assets(&env), [("boot", script)]);

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), script);
        assert_eq!(env.events.events()[0].reason, Reason::Generate);
    }

    #[tokio::test]
    async fn test_provisioning_ignition_gets_kubeconfig() {
        let env = TestEnv::new();
        unprovisioned(&env);
        env.write_default(
            Tier::ConfigMap,
            "ignition-default",
            "variant: fcos\nversion: 1.4.0\nstorage:\n  files:\n    - path: /etc/hostname\n      contents:\n        inline: {{ hostname }}\n    - path: /etc/kubeconfig.b64\n      contents:\n        inline: {{ kubeconfig | b64encode }}\n",
        );
        env.directory.add_secret(
            NAMESPACE,
            &format!("kubeconfig-inventory-{}", UUID),
            [("kubeconfig", b"apiVersion: v1".to_vec())],
        );

        let uri = format!("/ignition/{}/default", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;
        assert_eq!(response.status, StatusCode::OK);

        let doc: Value = serde_json::from_slice(&response.body).unwrap();
        let files = &doc["storage"]["files"];
        assert_eq!(files[0]["contents"]["source"], format!("data:,{}", UUID));
        assert_eq!(files[1]["contents"]["source"], "data:,YXBpVmVyc2lvbjogdjE%3D");
    }

    #[tokio::test]
    async fn test_provisioning_ignition_without_kubeconfig() {
        let env = TestEnv::new();
        unprovisioned(&env);
        env.write_default(Tier::ConfigMap, "ignition-default", "variant: fcos\nversion: 1.4.0\n");

        let uri = format!("/ignition/{}/default", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "Error in ignition reading\n");
    }

    #[tokio::test]
    async fn test_invalid_butane_is_internal_error() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", MAC);
        provisioned(&env, MAC);
        env.directory.add_secret(
            NAMESPACE,
            &machine_assets(&env),
            [("ignition-default", b"variant: rhcos\nversion: 4.0.0\n".to_vec())],
        );

        let uri = format!("/ignition/{}/default", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "Error in ignition rendering\n");
    }

    #[tokio::test]
    async fn test_ignition_is_deterministic() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", MAC);
        provisioned(&env, MAC);
        env.directory.add_secret(
            NAMESPACE,
            &machine_assets(&env),
            [(
                "ignition-default",
                b"variant: fcos\nversion: 1.5.0\nsystemd:\n  units:\n    - name: a.service\n      enabled: true\nstorage:\n  files:\n    - path: /etc/mac\n      contents:\n        inline: {{ mac }}\n".to_vec(),
            )],
        );

        let uri = format!("/ignition/{}/default", UUID);
        let first = get(env.router(), &uri, CLIENT, None).await;
        let second = get(env.router(), &uri, CLIENT, None).await;

        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.body, second.body);
    }

    #[tokio::test]
    async fn test_machine_becomes_established_between_requests() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", MAC);
        unprovisioned(&env);
        env.write_default(Tier::Secret, "boot", "default");
        env.directory
            .add_config_map(NAMESPACE, &machine_assets(&env), [("boot", "machine")]);
        let app = env.router();

        let uri = format!("/ipxe/{}/boot", UUID);
        assert_eq!(get(app.clone(), &uri, CLIENT, None).await.text(), "default");

        provisioned(&env, MAC);
        assert_eq!(get(app, &uri, CLIENT, None).await.text(), "machine");
    }

    #[tokio::test]
    async fn test_forwarded_header() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.9", MAC);
        provisioned(&env, MAC);
        env.directory
            .add_config_map(NAMESPACE, &machine_assets(&env), [("boot", "machine")]);

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, "127.0.0.1:1", Some("10.0.0.9, 10.0.0.1")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "machine");
    }

    #[tokio::test]
    async fn test_forwarded_header_disabled() {
        let mut env = TestEnv::new();
        env.config.disable_forward_header = true;
        register_ip(&env, "10.0.0.9", MAC);
        provisioned(&env, MAC);
        env.directory
            .add_config_map(NAMESPACE, &machine_assets(&env), [("boot", "machine")]);

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, "127.0.0.1:1", Some("10.0.0.9")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_ipv6_client() {
        let env = TestEnv::new();
        register_ip(&env, "fd00:0000:0000:0000:0000:0000:000b:0001", MAC);
        provisioned(&env, MAC);
        env.directory
            .add_config_map(NAMESPACE, &machine_assets(&env), [("boot", "machine")]);

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, "[fd00::b:1]:4711", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "machine");
    }

    #[tokio::test]
    async fn test_malformed_forwarded_address() {
        let env = TestEnv::new();
        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, "127.0.0.1:1", Some("bogus")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_duplicate_address_records() {
        let env = TestEnv::new();
        env.directory
            .add_ip(Ip::new("a", "10.0.0.5", "aabbccddeeff").in_namespace(NAMESPACE));
        env.directory
            .add_ip(Ip::new("b", "10.0.0.5", "001122334455").in_namespace(NAMESPACE));
        env.write_default(Tier::Secret, "boot", "default");

        let uri = format!("/ipxe/{}/boot", UUID);
        let response = get(env.router(), &uri, CLIENT, None).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_paths() {
        let env = TestEnv::new();
        let app = env.router();

        for uri in [
            "/ipxe/NOT-HEX/boot",
            "/ipxe/zz-top/boot",
            "/ignition/Upper/default",
            "/ignition/abc/Part",
        ] {
            let response = get(app.clone(), uri, CLIENT, None).await;
            assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_default_ipxe_metric_label() {
        let env = TestEnv::new();
        env.write_default(Tier::ConfigMap, "ipxe", "#!ipxe\n");
        get(env.router(), "/ipxe", "127.0.0.1:5000", None).await;
        assert_eq!(env.metrics.ipxe(), vec!["default".to_string()]);
    }

    #[tokio::test]
    async fn test_metrics_not_scrapable() {
        let env = TestEnv::new();
        let response = get(env.router(), "/metrics", "127.0.0.1:1", None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_prometheus_scrape_counts_violations() {
        let env = TestEnv::new();
        register_ip(&env, "10.0.0.5", "00:11:22:33:44:55");
        provisioned(&env, MAC);
        let directory: Arc<dyn Directory> = env.directory.clone();
        let app = router(AppState::with_parts(
            env.config.clone(),
            directory,
            Arc::new(ButaneTranslator::new(TranslateOptions::default())),
            AuditTrail::disabled(),
            Arc::new(PrometheusMetrics::new()),
        ));

        let uri = format!("/ipxe/{}/boot", UUID);
        get(app.clone(), &uri, CLIENT, None).await;

        let response = get(app, "/metrics", "127.0.0.1:1", None).await;
        assert_eq!(response.status, StatusCode::OK);
        let text = response.text();
        assert!(text.contains("bootward_binding_violations_total 1"));
        assert!(text.contains("ipxe_request_duration_seconds"));
    }
}
