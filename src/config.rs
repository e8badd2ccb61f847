//! Process configuration.
//!
//! Every flag can also be set through the environment, so the webhook can be
//! configured from a Deployment manifest without touching its arguments.

use std::path::{Path, PathBuf};

use clap::Parser;
use kube::Client;
use kube::config::{Config, InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use thiserror::Error;
use tracing::info;

use crate::health::HEALTH_PORT;
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Mutating admission webhook applying namespace scheduling policy to Pods
#[derive(Parser, Debug, Clone)]
#[command(name = "scheduling-webhook", version, about, long_about = None)]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = WEBHOOK_PORT)]
    pub port: u16,

    /// TLS certificate (PEM)
    #[arg(long, env = "TLS_CERT_FILE", default_value = WEBHOOK_CERT_PATH, value_name = "FILE")]
    pub tls_cert_file: PathBuf,

    /// TLS private key (PEM)
    #[arg(long, env = "TLS_KEY_FILE", default_value = WEBHOOK_KEY_PATH, value_name = "FILE")]
    pub tls_key_file: PathBuf,

    /// Kubernetes configuration. If empty, will use in-cluster configuration
    #[arg(long, env = "KUBE_CONFIG", value_name = "FILE")]
    pub kube_config: Option<PathBuf>,

    /// Port for the health and metrics server
    #[arg(long, env = "HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,
}

/// Errors building the Kubernetes client
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load in-cluster configuration: {0}")]
    InCluster(#[from] InClusterError),

    #[error("failed to load kubeconfig {path}: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to initialize kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Build the Kubernetes client from a kubeconfig file, or from the in-cluster
/// service account when no file is given.
pub async fn kube_client(kube_config: Option<&Path>) -> Result<Client, ConfigError> {
    let config = match kube_config {
        Some(path) => {
            let kubeconfig_error = |source| ConfigError::Kubeconfig {
                path: path.to_path_buf(),
                source,
            };
            let kubeconfig = Kubeconfig::read_from(path).map_err(kubeconfig_error)?;
            info!(path = %path.display(), "Using kubeconfig");
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(kubeconfig_error)?
        }
        None => {
            info!("Using in-cluster configuration");
            Config::incluster()?
        }
    };

    Ok(Client::try_from(config)?)
}
