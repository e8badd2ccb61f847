//! Topology spread constraints over the Pod's own labels.

use json_patch::PatchOperation;
use serde_json::{Value, json};

use super::{MutationContext, add};

/// Skew allowed between topology domains
pub const MAX_SKEW: i32 = 1;

/// Constraint action when the skew cannot be honoured
pub const WHEN_UNSATISFIABLE: &str = "DoNotSchedule";

const CONSTRAINTS: [&str; 2] = ["spec", "topologySpreadConstraints"];
const CONSTRAINTS_END: [&str; 3] = ["spec", "topologySpreadConstraints", "-"];

pub(crate) fn has_constraints(ctx: &MutationContext<'_>) -> bool {
    ctx.pod
        .spec
        .as_ref()
        .and_then(|spec| spec.topology_spread_constraints.as_ref())
        .is_some()
}

/// Append one spread constraint per configured topology key
pub fn mutate(ctx: &MutationContext<'_>) -> Vec<PatchOperation> {
    let keys = &ctx.policy.topology_spread_topology_keys;
    if keys.is_empty() {
        return Vec::new();
    }

    let mut ops = Vec::with_capacity(keys.len() + 1);
    if !has_constraints(ctx) {
        ops.push(add(&CONSTRAINTS, json!([])));
    }

    let selector = ctx.own_label_selector();
    ops.extend(
        keys.iter()
            .map(|key| add(&CONSTRAINTS_END, spread_constraint(key, selector.clone()))),
    );

    ops
}

fn spread_constraint(topology_key: &str, label_selector: Value) -> Value {
    json!({
        "labelSelector": label_selector,
        "maxSkew": MAX_SKEW,
        "topologyKey": topology_key,
        "whenUnsatisfiable": WHEN_UNSATISFIABLE,
    })
}
