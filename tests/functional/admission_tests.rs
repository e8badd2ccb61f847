//! AdmissionReview contents for Pods and pass-through kinds.

use scheduling_webhook::policy::{
    ANTI_AFFINITY_ANNOTATION, NODE_SELECTOR_ANNOTATION, TOPOLOGY_SPREAD_ANNOTATION,
};
use serde_json::json;

use crate::common::fixtures::{
    PodBuilder, REVIEW_UID, StaticResolver, pod_review_body, review_body,
};
use crate::harness::{Harness, decode_patch};

const ANTI_AFFINITY_PATH: &str =
    "/spec/affinity/podAntiAffinity/requiredDuringSchedulingIgnoredDuringExecution";

#[tokio::test]
async fn test_no_annotations_allows_with_empty_patch() {
    let harness = Harness::new(
        StaticResolver::new().namespace("team-a", &[("owner", "platform")]),
    );
    let pod = PodBuilder::new("web-0").label("app", "web").build();

    let response = harness.review(pod_review_body(&pod, "team-a")).await;
    assert_eq!(response["allowed"], json!(true));
    assert_eq!(response["uid"], json!(REVIEW_UID));
    assert_eq!(response["patchType"], json!("JSONPatch"));
    assert!(decode_patch(&response).is_empty());
}

#[tokio::test]
async fn test_non_pod_kind_passes_through() {
    // The namespace is unknown: a lookup would fail the request
    let harness = Harness::new(StaticResolver::new());
    let object = json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": "web", "namespace": "team-a"},
        "spec": {"ports": [{"port": 80}]}
    });

    let response = harness.review(review_body("Service", "team-a", object)).await;
    assert_eq!(response["allowed"], json!(true));
    assert_eq!(response["uid"], json!(REVIEW_UID));
    assert!(response.get("patch").is_none());
    assert_eq!(harness.resolver.lookups(), 0);
}

#[tokio::test]
async fn test_node_selector_merged_with_existing() {
    let harness = Harness::new(
        StaticResolver::new().namespace("team-a", &[(NODE_SELECTOR_ANNOTATION, "disktype=ssd,zone=us")]),
    );
    let pod = PodBuilder::new("web-0").node_selector("env", "prod").build();

    let patch = decode_patch(&harness.review(pod_review_body(&pod, "team-a")).await);
    assert_eq!(
        patch,
        vec![json!({
            "op": "replace",
            "path": "/spec/nodeSelector",
            "value": {"env": "prod", "disktype": "ssd", "zone": "us"}
        })]
    );
}

#[tokio::test]
async fn test_malformed_node_selector_token_dropped() {
    let harness = Harness::new(
        StaticResolver::new().namespace("team-a", &[(NODE_SELECTOR_ANNOTATION, "a=b=c")]),
    );
    let pod = PodBuilder::new("web-0").node_selector("env", "prod").build();

    let response = harness.review(pod_review_body(&pod, "team-a")).await;
    assert_eq!(response["allowed"], json!(true));
    assert!(decode_patch(&response).is_empty());
}

#[tokio::test]
async fn test_anti_affinity_on_pod_without_affinity() {
    let harness = Harness::new(StaticResolver::new().namespace(
        "team-a",
        &[(
            ANTI_AFFINITY_ANNOTATION,
            "kubernetes.io/hostname,topology.kubernetes.io/zone",
        )],
    ));
    let pod = PodBuilder::new("web-0")
        .label("app", "web")
        .label("tier", "frontend")
        .build();

    let patch = decode_patch(&harness.review(pod_review_body(&pod, "team-a")).await);
    let selector = json!({"matchLabels": {"app": "web", "tier": "frontend"}});
    assert_eq!(
        patch,
        vec![
            json!({"op": "add", "path": "/spec/affinity", "value": {}}),
            json!({"op": "add", "path": "/spec/affinity/podAntiAffinity", "value": {}}),
            json!({"op": "add", "path": ANTI_AFFINITY_PATH, "value": []}),
            json!({
                "op": "add",
                "path": format!("{ANTI_AFFINITY_PATH}/-"),
                "value": {"labelSelector": selector, "topologyKey": "kubernetes.io/hostname"}
            }),
            json!({
                "op": "add",
                "path": format!("{ANTI_AFFINITY_PATH}/-"),
                "value": {"labelSelector": selector, "topologyKey": "topology.kubernetes.io/zone"}
            }),
        ]
    );
}

#[tokio::test]
async fn test_topology_spread_skips_empty_token() {
    let harness = Harness::new(
        StaticResolver::new().namespace("team-a", &[(TOPOLOGY_SPREAD_ANNOTATION, "zone,,rack")]),
    );
    let pod = PodBuilder::new("db-0").label("app", "db").build();

    let patch = decode_patch(&harness.review(pod_review_body(&pod, "team-a")).await);
    assert_eq!(patch.len(), 3);
    assert_eq!(patch[0]["path"], "/spec/topologySpreadConstraints");
    for (op, key) in patch[1..].iter().zip(["zone", "rack"]) {
        assert_eq!(op["path"], "/spec/topologySpreadConstraints/-");
        assert_eq!(op["value"]["topologyKey"], key);
        assert_eq!(op["value"]["maxSkew"], 1);
        assert_eq!(op["value"]["whenUnsatisfiable"], "DoNotSchedule");
    }
}

#[tokio::test]
async fn test_uid_echoed_for_every_decodable_request() {
    let harness = Harness::new(
        StaticResolver::new().namespace("team-a", &[(TOPOLOGY_SPREAD_ANNOTATION, "zone")]),
    );

    let pod_response = harness
        .review(pod_review_body(&PodBuilder::new("web-0").build(), "team-a"))
        .await;
    let other_response = harness
        .review(review_body(
            "ConfigMap",
            "team-a",
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg"}}),
        ))
        .await;

    assert_eq!(pod_response["uid"], json!(REVIEW_UID));
    assert_eq!(other_response["uid"], json!(REVIEW_UID));
}

#[tokio::test]
async fn test_every_request_looks_up_namespace() {
    let harness = Harness::new(
        StaticResolver::new().namespace("team-a", &[(NODE_SELECTOR_ANNOTATION, "disktype=ssd")]),
    );
    let body = pod_review_body(&PodBuilder::new("web-0").build(), "team-a");

    harness.review(body.clone()).await;
    harness.review(body).await;
    assert_eq!(harness.resolver.lookups(), 2);

    let metrics = harness.health.metrics.encode();
    assert!(metrics.contains("outcome=\"patched\""));
}
