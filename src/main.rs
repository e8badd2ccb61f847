//! scheduling-webhook - applies namespace scheduling policy to Pods.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads the TLS certificate and creates the Kubernetes client
//! - Starts the health server and the TLS webhook server
//! - Drains in-flight admission requests on SIGTERM or SIGINT

use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use scheduling_webhook::config::{Args, kube_client};
use scheduling_webhook::health::{HealthState, run_health_server};
use scheduling_webhook::webhooks::{load_tls_config, shutdown};
use scheduling_webhook::{KubeNamespaceResolver, PodMutator, WebhookState, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scheduling_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    let args = Args::parse();
    info!(port = args.port, "Starting scheduling-webhook");

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    let tls = load_tls_config(&args.tls_cert_file, &args.tls_key_file).await?;
    let client = kube_client(args.kube_config.as_deref()).await?;
    info!("Kubernetes client initialized");

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness works while TLS comes up
    let health_handle = {
        let health_state = health_state.clone();
        let port = args.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let mutator = PodMutator::new(
        KubeNamespaceResolver::new(client),
        Some(health_state.clone()),
    );
    let state = Arc::new(WebhookState::new(mutator));
    let handle = Handle::new();

    let mut webhook_handle = tokio::spawn(run_webhook_server(
        state,
        tls,
        args.port,
        handle.clone(),
        Some(health_state.clone()),
    ));

    tokio::select! {
        result = &mut webhook_handle => {
            match result {
                Ok(Ok(())) => info!("Webhook server stopped"),
                Ok(Err(e)) => error!("Webhook server error: {}", e),
                Err(e) => error!("Webhook server task panicked: {}", e),
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new admission requests
            health_state.set_ready(false).await;

            let grace = Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS);
            info!(grace_secs = SHUTDOWN_GRACE_PERIOD_SECS, "Draining in-flight admission requests");
            shutdown(&handle, grace);

            match webhook_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Webhook server error during shutdown: {}", e),
                Err(e) => error!("Webhook server task panicked: {}", e),
            }
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal: the webhook cannot drain requests
/// without them.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
