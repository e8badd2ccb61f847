//! Patch builder for Pod admission.
//!
//! Mutations run in a fixed order and each contributes JSON Patch operations
//! for its own subtree of the Pod spec:
//! 1. Node selector merge (`/spec/nodeSelector`)
//! 2. Anti-affinity terms (`/spec/affinity/podAntiAffinity/...`)
//! 3. Topology spread constraints (`/spec/topologySpreadConstraints`)
//!
//! Nothing here mutates the Pod. Each pass only describes its changes, and a
//! parent `add` is always emitted before any `add` into it.

pub mod anti_affinity;
pub mod node_selector;
pub mod topology_spread;

use std::collections::BTreeMap;

use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::Pod;
use serde_json::{Map, Value};

use crate::policy::NamespacePolicy;

/// Inputs shared by every mutation pass
pub struct MutationContext<'a> {
    /// The Pod under admission
    pub pod: &'a Pod,
    /// Policy of the Pod's namespace
    pub policy: &'a NamespacePolicy,
}

impl<'a> MutationContext<'a> {
    pub fn new(pod: &'a Pod, policy: &'a NamespacePolicy) -> Self {
        Self { pod, policy }
    }

    /// Label selector matching the Pod's own labels.
    ///
    /// `matchLabels` is left out when the Pod has no labels.
    pub fn own_label_selector(&self) -> Value {
        let mut selector = Map::new();
        if let Some(labels) = self.pod.metadata.labels.as_ref()
            && !labels.is_empty()
        {
            selector.insert("matchLabels".to_string(), string_map(labels));
        }
        Value::Object(selector)
    }
}

/// Build the full patch for a Pod.
pub fn build_patch(pod: &Pod, policy: &NamespacePolicy) -> Vec<PatchOperation> {
    let ctx = MutationContext::new(pod, policy);

    let mut ops = node_selector::mutate(&ctx);
    ops.extend(anti_affinity::mutate(&ctx));
    ops.extend(topology_spread::mutate(&ctx));
    ops
}

pub(crate) fn add(tokens: &[&str], value: Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(tokens.iter().copied()),
        value,
    })
}

pub(crate) fn replace(tokens: &[&str], value: Value) -> PatchOperation {
    PatchOperation::Replace(ReplaceOperation {
        path: PointerBuf::from_tokens(tokens.iter().copied()),
        value,
    })
}

pub(crate) fn string_map(entries: &BTreeMap<String, String>) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}
