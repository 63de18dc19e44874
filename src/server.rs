//! HTTP surface: the webhook endpoint and a health check.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::ApiError;
use crate::types::WebhookPayload;

/// Header used by the tracker to verify ownership of the target URL.
pub const HOOK_SECRET_HEADER: HeaderName = HeaderName::from_static("x-hook-secret");

/// State shared across handlers.
#[derive(Clone)]
pub struct WebhookServer {
    dispatcher: Arc<Dispatcher>,
}

impl WebhookServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Webhook endpoint.
///
/// A request carrying `X-Hook-Secret` is a handshake: the value is echoed
/// back with an empty body and nothing else is looked at. Anything else must
/// be a POSTed delivery. Any decodable delivery is acknowledged with 200,
/// whatever happens while processing it, so the sender never retries.
async fn webhook(
    State(state): State<WebhookServer>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = headers.get(&HOOK_SECRET_HEADER) {
        info!("Received webhook handshake");
        let mut response = StatusCode::OK.into_response();
        response
            .headers_mut()
            .insert(HOOK_SECRET_HEADER, secret.clone());
        return response;
    }

    if method != Method::POST {
        return ApiError::invalid_request("Invalid request").into_response();
    }

    let payload = match decode_payload(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Rejecting malformed webhook payload");
            return ApiError::malformed_payload(e).into_response();
        }
    };

    debug!(events = payload.events.len(), "Received webhook delivery");
    state.dispatcher.dispatch_payload(payload).await;
    Json(json!({ "status": "success" })).into_response()
}

/// Decode a delivery body. Only a JSON object is a delivery; derived struct
/// decoding would otherwise also take a JSON array.
fn decode_payload(body: &[u8]) -> Result<WebhookPayload, String> {
    let value: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("expected a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: WebhookServer, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, get(webhook).post(webhook))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve in the background.
///
/// Returns a oneshot sender that triggers graceful shutdown, and the address
/// actually bound.
pub async fn start_server(
    state: WebhookServer,
    bind_addr: &str,
    webhook_path: &str,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(state, webhook_path);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Webhook server listening on http://{}{}", bound_addr, webhook_path);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Webhook server shutting down");
            })
            .await
        {
            tracing::error!("Webhook server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }

    #[test]
    fn test_decode_payload_requires_object() {
        assert!(decode_payload(b"[]").is_err());
        assert!(decode_payload(b"[[]]").is_err());
        assert!(decode_payload(b"\"x\"").is_err());
        assert!(decode_payload(b"{}").unwrap().events.is_empty());
        assert_eq!(decode_payload(br#"{"events": [{}]}"#).unwrap().events.len(), 1);
    }

    #[test]
    fn test_secret_header_is_lowercase() {
        assert_eq!(HOOK_SECRET_HEADER.as_str(), "x-hook-secret");
    }
}
