//! scheduling-webhook library crate
//!
//! A mutating admission webhook that applies namespace-level scheduling policy
//! (node selectors, pod anti-affinity, topology spread) to Pods at creation.

pub mod config;
pub mod error;
pub mod health;
pub mod policy;
pub mod webhooks;

pub use error::AdmissionError;
pub use health::HealthState;
pub use policy::{KubeNamespaceResolver, NamespacePolicy, PolicyResolver};
pub use webhooks::{
    PodMutator, ServerError, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookState,
    build_patch, run_webhook_server,
};
