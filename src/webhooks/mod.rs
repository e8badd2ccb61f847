//! Mutating admission webhook for Pods.
//!
//! - `mutations`: builds the JSON Patch from the namespace policy
//! - `review`: AdmissionReview decoding and response assembly
//! - `server`: TLS listener and request validation

pub mod mutations;
pub mod review;
mod server;

pub use mutations::build_patch;
pub use review::{POD_KIND, PodMutator};
pub use server::{
    MUTATE_PATH, ServerError, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookState,
    create_webhook_router, load_tls_config, run_webhook_server, shutdown,
};
