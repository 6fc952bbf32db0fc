use crate::assets::is_valid_part;
use crate::client_ip::ClientIp;
use crate::error::BootError;
use crate::metrics::RequestTimer;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, warn};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(ok200))
        .route("/ipxe", get(default_ipxe))
        .route("/ipxe/{uuid}/{part}", get(ipxe_by_uuid))
        .route("/ignition/{uuid}/{part}", get(ignition_by_uuid))
        .route("/metrics", get(metrics_handler))
}

/// Liveness
pub async fn ok200() -> &'static str {
    "ok\n"
}

fn body(content_type: &'static str, body: Vec<u8>) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}

/// `[a-f0-9-]+`
fn is_ipxe_uuid(uuid: &str) -> bool {
    !uuid.is_empty()
        && uuid
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b) || b == b'-')
}

pub async fn default_ipxe(State(state): State<AppState>) -> Response {
    let timer = RequestTimer::start();
    let result = state.service.default_boot_script().await;
    state.metrics.record_ipxe_duration("default", timer.elapsed());

    match result {
        Ok(script) => body(TEXT_PLAIN, script),
        Err(e) => e.into_response(),
    }
}

pub async fn ipxe_by_uuid(
    State(state): State<AppState>,
    Path((uuid, part)): Path<(String, String)>,
    client: Result<ClientIp, BootError>,
) -> Response {
    if !is_ipxe_uuid(&uuid) || !is_valid_part(&part) {
        debug!(uuid = %uuid, part = %part, "Rejected boot script path");
        return not_found();
    }

    let timer = RequestTimer::start();
    let result = match client {
        Ok(client) => state.service.boot_script(client.as_str(), &uuid, &part).await,
        Err(e) => Err(e),
    };
    state.metrics.record_ipxe_duration(&uuid, timer.elapsed());

    match result {
        Ok(artifact) => body(TEXT_PLAIN, artifact.body),
        Err(e) => {
            warn!(uuid = %uuid, part = %part, "Boot script request failed");
            e.into_response()
        }
    }
}

pub async fn ignition_by_uuid(
    State(state): State<AppState>,
    Path((uuid, part)): Path<(String, String)>,
    client: Result<ClientIp, BootError>,
) -> Response {
    // Ignition UUIDs share the part alphabet
    if !is_valid_part(&uuid) || !is_valid_part(&part) {
        debug!(uuid = %uuid, part = %part, "Rejected ignition path");
        return not_found();
    }

    let timer = RequestTimer::start();
    let result = match client {
        Ok(client) => state.service.ignition(client.as_str(), &uuid, &part).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(artifact) => {
            state
                .metrics
                .record_ignition_duration(artifact.mac.as_deref().unwrap_or(""), timer.elapsed());
            body(APPLICATION_JSON, artifact.body)
        }
        Err(e) => {
            state.metrics.record_ignition_duration("", timer.elapsed());
            warn!(uuid = %uuid, part = %part, "Ignition request failed");
            e.into_response()
        }
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Some(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => not_found(),
    }
}
