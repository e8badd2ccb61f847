//! AdmissionReview handling for Pod mutation.
//!
//! Decodes the review, passes non-Pod kinds through untouched, resolves the
//! namespace policy and attaches the resulting JSON Patch to the response.

use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, ConvertAdmissionReviewError,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::{AdmissionError, Result};
use crate::health::HealthState;
use crate::policy::PolicyResolver;
use crate::webhooks::mutations::build_patch;

/// Kind handled by the mutator; every other kind passes through
pub const POD_KIND: &str = "Pod";

/// The request body was not a usable AdmissionReview
#[derive(Error, Debug)]
pub enum ReviewDecodeError {
    #[error("failed to decode AdmissionReview: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid AdmissionReview: {0}")]
    MissingRequest(#[from] ConvertAdmissionReviewError),
}

/// A decoded admission request with its object left undecoded.
///
/// The object stays raw JSON until the kind is known, so a malformed Pod is
/// reported against a request whose UID is already available.
#[derive(Debug)]
pub struct ReviewRequest {
    pub request: AdmissionRequest<DynamicObject>,
    pub object: Option<Value>,
}

/// Decode a raw request body into an admission request
pub fn decode_request(body: &[u8]) -> std::result::Result<ReviewRequest, ReviewDecodeError> {
    let mut review: Value = serde_json::from_slice(body)?;

    let mut object = None;
    if let Some(request) = review.get_mut("request").and_then(Value::as_object_mut) {
        object = request.remove("object").filter(|value| !value.is_null());
        request.remove("oldObject");
    }

    let review: AdmissionReview<DynamicObject> = serde_json::from_value(review)?;
    Ok(ReviewRequest {
        request: review.try_into()?,
        object,
    })
}

/// Decode the admission object as a Pod
pub fn decode_pod(object: Option<&Value>) -> Result<Pod> {
    let object = object.ok_or(AdmissionError::MissingObject)?;
    Pod::deserialize(object).map_err(AdmissionError::ObjectDecode)
}

/// Pod mutator driven by a [`PolicyResolver`].
///
/// Holds no per-request state, so one instance serves all requests concurrently.
pub struct PodMutator<R> {
    resolver: R,
    health_state: Option<Arc<HealthState>>,
}

impl<R: PolicyResolver> PodMutator<R> {
    /// Create a mutator; metrics are recorded when `health_state` is provided
    pub fn new(resolver: R, health_state: Option<Arc<HealthState>>) -> Self {
        Self {
            resolver,
            health_state,
        }
    }

    /// Answer a raw AdmissionReview body.
    ///
    /// An undecodable review is answered with a disallowed response carrying
    /// the decode error. Failures after decoding are returned as errors.
    pub async fn review(&self, body: &[u8]) -> Result<AdmissionReview<DynamicObject>> {
        let review = match decode_request(body) {
            Ok(review) => review,
            Err(e) => {
                warn!(error = %e, "Can't decode admission review");
                self.record_review("", "invalid");
                return Ok(AdmissionResponse::invalid(e.to_string()).into_review());
            }
        };

        let request = &review.request;
        let kind = request.kind.kind.clone();
        match self.mutate(&review).await {
            Ok((response, outcome)) => {
                self.record_review(&kind, outcome);
                Ok(response.into_review())
            }
            Err(e) => {
                error!(
                    uid = %request.uid,
                    namespace = ?request.namespace,
                    reason = e.reason(),
                    error = %e,
                    "Admission request failed"
                );
                self.record_review(&kind, "error");
                Err(e)
            }
        }
    }

    /// Compute the response for a decoded request.
    ///
    /// The response always carries the request UID. The returned label is
    /// `passthrough` for non-Pod kinds and `patched` otherwise.
    pub async fn mutate(&self, review: &ReviewRequest) -> Result<(AdmissionResponse, &'static str)> {
        let request = &review.request;
        let uid = &request.uid;

        if request.kind.kind != POD_KIND {
            debug!(uid = %uid, kind = %request.kind.kind, "Not a Pod, allowing unchanged");
            return Ok((AdmissionResponse::from(request), "passthrough"));
        }

        let pod = decode_pod(review.object.as_ref())?;
        let namespace = request
            .namespace
            .as_deref()
            .or(pod.metadata.namespace.as_deref())
            .ok_or(AdmissionError::MissingNamespace)?;

        let started = Instant::now();
        let lookup = self.resolver.resolve(namespace).await;
        if let Some(state) = &self.health_state {
            state
                .metrics
                .observe_namespace_lookup(started.elapsed().as_secs_f64());
        }
        let policy = lookup?;

        let ops = build_patch(&pod, &policy);
        let patch_ops = ops.len();

        let response = AdmissionResponse::from(request).with_patch(json_patch::Patch(ops))?;

        if let Some(state) = &self.health_state {
            state.metrics.record_patch_operations(patch_ops as u64);
        }
        info!(
            uid = %uid,
            namespace = %namespace,
            pod = ?pod.metadata.name.as_ref().or(pod.metadata.generate_name.as_ref()),
            patch_ops,
            "Admission request allowed"
        );

        Ok((response, "patched"))
    }

    fn record_review(&self, kind: &str, outcome: &str) {
        if let Some(state) = &self.health_state {
            state.metrics.record_review(kind, outcome);
        }
    }
}
