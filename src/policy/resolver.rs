//! Namespace policy lookup.
//!
//! Every admission request performs one GET of its Namespace. Nothing is
//! cached and failures are never retried.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};
use thiserror::Error;
use tracing::debug;

use super::NamespacePolicy;

/// The namespace could not be fetched.
///
/// Not-found, transient and authorization failures are all reported the same way.
#[derive(Error, Debug)]
#[error("failed to look up namespace {namespace}: {source}")]
pub struct PolicyLookupError {
    /// Namespace that was requested
    pub namespace: String,
    /// Underlying API error
    #[source]
    pub source: kube::Error,
}

/// Source of namespace scheduling policy.
pub trait PolicyResolver {
    /// Resolve the policy for the namespace with the given name.
    fn resolve(
        &self,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<NamespacePolicy, PolicyLookupError>> + Send;
}

impl<R: PolicyResolver + Send + Sync> PolicyResolver for Arc<R> {
    fn resolve(
        &self,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<NamespacePolicy, PolicyLookupError>> + Send {
        (**self).resolve(namespace)
    }
}

/// Resolves policy from live Namespace objects through the Kubernetes API.
///
/// The client is built once at startup and shared read-only across requests.
#[derive(Clone)]
pub struct KubeNamespaceResolver {
    client: Client,
}

impl KubeNamespaceResolver {
    /// Create a resolver backed by the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PolicyResolver for KubeNamespaceResolver {
    async fn resolve(&self, namespace: &str) -> Result<NamespacePolicy, PolicyLookupError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let ns = namespaces
            .get(namespace)
            .await
            .map_err(|source| PolicyLookupError {
                namespace: namespace.to_string(),
                source,
            })?;

        let policy = ns
            .metadata
            .annotations
            .as_ref()
            .map(NamespacePolicy::from_annotations)
            .unwrap_or_default();

        debug!(
            namespace = %namespace,
            node_selectors = policy.node_selectors.len(),
            anti_affinity_keys = policy.anti_affinity_topology_keys.len(),
            topology_spread_keys = policy.topology_spread_topology_keys.len(),
            "Resolved namespace policy"
        );

        Ok(policy)
    }
}
