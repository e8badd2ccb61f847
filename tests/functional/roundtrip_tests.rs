//! The emitted patch applied to the submitted Pod.
//!
//! The API server applies the patch with RFC 6902 semantics; `json_patch::patch`
//! does the same here, so a patch with a missing parent or a `replace` of an
//! absent member fails these tests.

use scheduling_webhook::policy::{
    ANTI_AFFINITY_ANNOTATION, NODE_SELECTOR_ANNOTATION, TOPOLOGY_SPREAD_ANNOTATION,
};
use serde_json::{Value, json};

use crate::common::fixtures::{PodBuilder, StaticResolver, pod_json, pod_review_body};
use crate::harness::{Harness, decode_typed_patch};

fn all_policies() -> StaticResolver {
    StaticResolver::new().namespace(
        "team-a",
        &[
            (NODE_SELECTOR_ANNOTATION, "disktype=ssd,env=staging"),
            (ANTI_AFFINITY_ANNOTATION, "kubernetes.io/hostname"),
            (TOPOLOGY_SPREAD_ANNOTATION, "topology.kubernetes.io/zone"),
        ],
    )
}

async fn apply(harness: &Harness, pod: &k8s_openapi::api::core::v1::Pod) -> Value {
    let response = harness.review(pod_review_body(pod, "team-a")).await;
    let patch = decode_typed_patch(&response);

    let mut document = pod_json(pod);
    json_patch::patch(&mut document, &patch.0).unwrap();
    document
}

#[tokio::test]
async fn test_roundtrip_on_bare_pod() {
    let harness = Harness::new(all_policies());
    let pod = PodBuilder::new("web-0").label("app", "web").build();

    let patched = apply(&harness, &pod).await;
    let selector = json!({"matchLabels": {"app": "web"}});

    assert_eq!(
        patched["spec"]["nodeSelector"],
        json!({"disktype": "ssd", "env": "staging"})
    );
    assert_eq!(
        patched["spec"]["affinity"],
        json!({"podAntiAffinity": {"requiredDuringSchedulingIgnoredDuringExecution": [
            {"labelSelector": selector, "topologyKey": "kubernetes.io/hostname"}
        ]}})
    );
    assert_eq!(
        patched["spec"]["topologySpreadConstraints"],
        json!([{
            "labelSelector": selector,
            "maxSkew": 1,
            "topologyKey": "topology.kubernetes.io/zone",
            "whenUnsatisfiable": "DoNotSchedule"
        }])
    );
    assert_eq!(patched["spec"]["containers"], pod_json(&pod)["spec"]["containers"]);
}

#[tokio::test]
async fn test_roundtrip_preserves_existing_constraints() {
    let harness = Harness::new(all_policies());
    let pod = PodBuilder::new("web-0")
        .label("app", "web")
        .node_selector("env", "prod")
        .anti_affinity_term("rack")
        .spread_constraint("rack")
        .build();

    let patched = apply(&harness, &pod).await;

    assert_eq!(
        patched["spec"]["nodeSelector"],
        json!({"disktype": "ssd", "env": "staging"})
    );

    let terms = patched["spec"]["affinity"]["podAntiAffinity"]
        ["requiredDuringSchedulingIgnoredDuringExecution"]
        .as_array()
        .unwrap();
    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0]["topologyKey"], "rack");
    assert_eq!(terms[1]["topologyKey"], "kubernetes.io/hostname");

    let constraints = patched["spec"]["topologySpreadConstraints"].as_array().unwrap();
    assert_eq!(constraints.len(), 2);
    assert_eq!(constraints[0]["whenUnsatisfiable"], "ScheduleAnyway");
    assert_eq!(constraints[1]["topologyKey"], "topology.kubernetes.io/zone");
}

#[tokio::test]
async fn test_roundtrip_with_empty_affinity_object() {
    let harness = Harness::new(
        StaticResolver::new().namespace("team-a", &[(ANTI_AFFINITY_ANNOTATION, "zone,zone")]),
    );
    let pod = PodBuilder::new("web-0").empty_affinity().build();

    let patched = apply(&harness, &pod).await;
    let terms = patched["spec"]["affinity"]["podAntiAffinity"]
        ["requiredDuringSchedulingIgnoredDuringExecution"]
        .as_array()
        .unwrap();

    // Unlabelled pods get an empty selector
    assert_eq!(
        terms,
        &vec![
            json!({"labelSelector": {}, "topologyKey": "zone"}),
            json!({"labelSelector": {}, "topologyKey": "zone"}),
        ]
    );
}
