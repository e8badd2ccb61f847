//! Error types for admission handling.
//!
//! A malformed AdmissionReview is answered inside the protocol and never
//! becomes an [`AdmissionError`]. Everything here is fatal to its request and
//! leaves the outcome to the webhook's failure policy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kube::core::admission::SerializePatchError;
use thiserror::Error;

use crate::policy::PolicyLookupError;

/// Error type for a single admission request
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The request has no object to mutate
    #[error("admission request carries no object")]
    MissingObject,

    /// The request names no namespace to resolve policy from
    #[error("admission request carries no namespace")]
    MissingNamespace,

    /// The object could not be decoded as a Pod
    #[error("failed to decode pod: {0}")]
    ObjectDecode(#[source] serde_json::Error),

    /// The namespace could not be fetched
    #[error(transparent)]
    PolicyLookup(#[from] PolicyLookupError),

    /// The patch could not be serialized
    #[error("failed to serialize patch: {0}")]
    Serialization(#[from] SerializePatchError),
}

impl AdmissionError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::MissingObject | AdmissionError::ObjectDecode(_) => "ObjectDecode",
            AdmissionError::MissingNamespace | AdmissionError::PolicyLookup(_) => "PolicyLookup",
            AdmissionError::Serialization(_) => "Serialization",
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Result type alias for admission handling
pub type Result<T> = std::result::Result<T, AdmissionError>;
