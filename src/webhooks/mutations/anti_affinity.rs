//! Required pod anti-affinity against the Pod's own labels.
//!
//! Missing levels of `affinity.podAntiAffinity.requiredDuringSchedulingIgnoredDuringExecution`
//! are scaffolded first, each only if absent, then one term per topology key is
//! appended to the end of the array.

use json_patch::PatchOperation;
use k8s_openapi::api::core::v1::{Affinity, Pod, PodAntiAffinity};
use serde_json::{Value, json};

use super::{MutationContext, add};

const AFFINITY: [&str; 2] = ["spec", "affinity"];
const POD_ANTI_AFFINITY: [&str; 3] = ["spec", "affinity", "podAntiAffinity"];
const REQUIRED_TERMS: [&str; 4] = [
    "spec",
    "affinity",
    "podAntiAffinity",
    "requiredDuringSchedulingIgnoredDuringExecution",
];
const REQUIRED_TERMS_END: [&str; 5] = [
    "spec",
    "affinity",
    "podAntiAffinity",
    "requiredDuringSchedulingIgnoredDuringExecution",
    "-",
];

fn affinity<'a>(ctx: &MutationContext<'a>) -> Option<&'a Affinity> {
    let pod: &'a Pod = ctx.pod;
    pod.spec.as_ref()?.affinity.as_ref()
}

fn pod_anti_affinity<'a>(ctx: &MutationContext<'a>) -> Option<&'a PodAntiAffinity> {
    affinity(ctx)?.pod_anti_affinity.as_ref()
}

pub(crate) fn has_affinity(ctx: &MutationContext<'_>) -> bool {
    affinity(ctx).is_some()
}

pub(crate) fn has_pod_anti_affinity(ctx: &MutationContext<'_>) -> bool {
    pod_anti_affinity(ctx).is_some()
}

pub(crate) fn has_required_terms(ctx: &MutationContext<'_>) -> bool {
    pod_anti_affinity(ctx)
        .and_then(|anti| {
            anti.required_during_scheduling_ignored_during_execution
                .as_ref()
        })
        .is_some()
}

/// Append anti-affinity terms for every configured topology key
pub fn mutate(ctx: &MutationContext<'_>) -> Vec<PatchOperation> {
    let keys = &ctx.policy.anti_affinity_topology_keys;
    if keys.is_empty() {
        return Vec::new();
    }

    let mut ops = Vec::with_capacity(keys.len() + 3);

    if !has_affinity(ctx) {
        ops.push(add(&AFFINITY, json!({})));
    }
    if !has_pod_anti_affinity(ctx) {
        ops.push(add(&POD_ANTI_AFFINITY, json!({})));
    }
    if !has_required_terms(ctx) {
        ops.push(add(&REQUIRED_TERMS, json!([])));
    }

    let selector = ctx.own_label_selector();
    ops.extend(
        keys.iter()
            .map(|key| add(&REQUIRED_TERMS_END, affinity_term(key, selector.clone()))),
    );

    ops
}

fn affinity_term(topology_key: &str, label_selector: Value) -> Value {
    json!({
        "labelSelector": label_selector,
        "topologyKey": topology_key,
    })
}
