//! Admission webhook server.
//!
//! Serves `POST /mutate` over TLS for a MutatingWebhookConfiguration that
//! targets Pod creation. The TLS certificate and key are usually mounted from
//! a cert-manager secret.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, extract::State, routing::post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::policy::PolicyResolver;
use crate::webhooks::review::PodMutator;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/tls/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/tls/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Route the API server calls
pub const MUTATE_PATH: &str = "/mutate";

/// Content type accepted for AdmissionReview bodies
const JSON_CONTENT_TYPE: &str = "application/json";

/// Shared state for webhook handlers
pub struct WebhookState<R> {
    pub mutator: PodMutator<R>,
}

impl<R: PolicyResolver> WebhookState<R> {
    pub fn new(mutator: PodMutator<R>) -> Self {
        Self { mutator }
    }
}

/// Create the webhook router
pub fn create_webhook_router<R>(state: Arc<WebhookState<R>>) -> Router
where
    R: PolicyResolver + Send + Sync + 'static,
{
    Router::new()
        .route(MUTATE_PATH, post(mutate_pod::<R>))
        .with_state(state)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
}

/// Pod mutation admission webhook handler
async fn mutate_pod<R>(
    State(state): State<Arc<WebhookState<R>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: PolicyResolver + Send + Sync + 'static,
{
    if !is_json(&headers) {
        let content_type = headers.get(header::CONTENT_TYPE);
        warn!(content_type = ?content_type, "Rejecting request, expect application/json");
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "invalid Content-Type, expect `application/json`",
        )
            .into_response();
    }

    if body.is_empty() {
        warn!("Empty body received");
        return (StatusCode::BAD_REQUEST, "empty body").into_response();
    }

    let review = match state.mutator.review(&body).await {
        Ok(review) => review,
        Err(e) => return e.into_response(),
    };

    match serde_json::to_vec(&review) {
        Ok(bytes) => {
            debug!(bytes = bytes.len(), "Writing admission review response");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Error marshalling admission review");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum ServerError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[source] std::io::Error),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Load the TLS certificate and key (PEM).
///
/// Called at startup so an unreadable certificate stops the process before
/// anything is served.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, ServerError> {
    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(ServerError::TlsConfig)
}

/// Run the webhook server with TLS until `handle` is shut down.
///
/// Readiness is set once the listener is bound and cleared when the server stops.
pub async fn run_webhook_server<R>(
    state: Arc<WebhookState<R>>,
    tls: RustlsConfig,
    port: u16,
    handle: Handle,
    health_state: Option<Arc<HealthState>>,
) -> Result<(), ServerError>
where
    R: PolicyResolver + Send + Sync + 'static,
{
    let app = create_webhook_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    if let Some(health) = health_state.clone() {
        let handle = handle.clone();
        tokio::spawn(async move {
            if handle.listening().await.is_some() {
                health.set_ready(true).await;
            }
        });
    }

    info!(port, path = MUTATE_PATH, "Webhook server listening with TLS");
    let result = axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(ServerError::Server);

    if let Some(health) = health_state {
        health.set_ready(false).await;
    }

    result
}

/// Stop accepting connections and give in-flight reviews `grace` to finish
pub fn shutdown(handle: &Handle, grace: Duration) {
    handle.graceful_shutdown(Some(grace));
}
