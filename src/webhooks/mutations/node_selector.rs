//! Node selector merge.
//!
//! The namespace pairs are merged over the Pod's existing `nodeSelector`, the
//! namespace winning on key collisions. The merged map is written back with a
//! single operation: `replace` when the Pod already has a `nodeSelector`,
//! `add` when it does not (`replace` on a missing member is invalid JSON Patch).

use json_patch::PatchOperation;

use super::{MutationContext, add, replace, string_map};

const PATH: [&str; 2] = ["spec", "nodeSelector"];

/// Merge namespace node selectors into the Pod
pub fn mutate(ctx: &MutationContext<'_>) -> Vec<PatchOperation> {
    if ctx.policy.node_selectors.is_empty() {
        return Vec::new();
    }

    let existing = ctx
        .pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_selector.as_ref());

    let mut merged = existing.cloned().unwrap_or_default();
    for (key, value) in &ctx.policy.node_selectors {
        merged.insert(key.clone(), value.clone());
    }

    let value = string_map(&merged);
    let op = if existing.is_some() {
        replace(&PATH, value)
    } else {
        add(&PATH, value)
    };

    vec![op]
}
