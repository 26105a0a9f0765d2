//! HTTP error mapping

use bridge_core::IntakeError;
use bridge_forms::FieldViolation;
use bridge_store::RepositoryError;
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

/// Failure of one API request
#[derive(Debug)]
pub enum ApiError {
    Intake(IntakeError),
    /// Malformed path, query or header value
    BadRequest(String),
    /// No `x-actor-id` header
    Unauthenticated,
}

impl Reject for ApiError {}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        Self::Intake(err)
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub message: String,
    pub retriable: bool,
    #[serde(skip_serializing_if = "no_violations")]
    pub violations: &'a [FieldViolation],
}

fn no_violations(violations: &&[FieldViolation]) -> bool {
    violations.is_empty()
}

impl ApiError {
    /// Status code, machine-readable code and retry hint
    #[must_use]
    pub fn classify(&self) -> (StatusCode, &'static str, bool) {
        let err = match self {
            ApiError::BadRequest(_) => return (StatusCode::BAD_REQUEST, "bad_request", false),
            ApiError::Unauthenticated => {
                return (StatusCode::UNAUTHORIZED, "unauthenticated", false)
            }
            ApiError::Intake(e) => e,
        };
        match err {
            IntakeError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed", false),
            IntakeError::UnknownCategory(_) => {
                (StatusCode::BAD_REQUEST, "unknown_category", false)
            }
            IntakeError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", false),
            IntakeError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "invalid_transition", false)
            }
            IntakeError::DocumentNotApplicable(_) => {
                (StatusCode::CONFLICT, "document_not_applicable", false)
            }
            IntakeError::Repository(RepositoryError::StatusConflict { .. }) => {
                (StatusCode::CONFLICT, "status_conflict", true)
            }
            IntakeError::AllocationFailure(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "allocation_failed", true)
            }
            IntakeError::Timeout { .. } => (StatusCode::SERVICE_UNAVAILABLE, "timeout", true),
            e if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", true),
            IntakeError::Render(_) | IntakeError::Store(_) => {
                (StatusCode::BAD_GATEWAY, "document_failed", false)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal", false),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Intake(e) => e.to_string(),
            ApiError::BadRequest(m) => m.clone(),
            ApiError::Unauthenticated => "missing x-actor-id header".to_string(),
        }
    }

    fn violations(&self) -> &[FieldViolation] {
        match self {
            ApiError::Intake(IntakeError::Validation(errors)) => &errors.0,
            _ => &[],
        }
    }

    /// JSON reply for this error
    #[must_use]
    pub fn to_reply(&self) -> warp::reply::Response {
        let (status, code, retriable) = self.classify();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        let body = ErrorBody {
            error: code,
            message: self.message(),
            retriable,
            violations: self.violations(),
        };
        warp::reply::with_status(warp::reply::json(&body), status).into_response()
    }
}

/// Turn every rejection into a JSON error body
///
/// # Errors
/// Never; the `Result` matches `warp::Filter::recover`
pub async fn handle_rejection(rejection: Rejection) -> Result<warp::reply::Response, Infallible> {
    if let Some(err) = rejection.find::<ApiError>() {
        return Ok(err.to_reply());
    }

    let (status, code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "no such route".to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
    } else if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed".to_string(),
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "length_required",
            "content-length header required".to_string(),
        )
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "request body too large".to_string(),
        )
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "unhandled rejection".to_string(),
        )
    };

    let body = ErrorBody {
        error: code,
        message,
        retriable: false,
        violations: &[],
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
}
