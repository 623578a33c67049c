//! Error types for the proxy boundary.
//!
//! Every failure a proxied call can hit is a [`ProxyError`]. Handlers never
//! let one escape as a panic or a bare status; it is always serialized into
//! an [`ErrorBody`].
//!
//! Historically every failure answered `500`. That remains the default
//! ([`StatusMode::Legacy`]); [`StatusMode::Strict`] maps each kind to the
//! status a client would expect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::backend::BackendError;

/// Field name to message mapping for rejected payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`; the first message per field wins.
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// Builds a single-field error set.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(field, message);
        errors
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Converts into `Ok(())` when no field was rejected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// How failures map to HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusMode {
    /// Every failure answers 500.
    #[default]
    Legacy,
    /// Failures answer a status matching their kind.
    Strict,
}

/// Failures at the proxy boundary.
#[derive(Debug)]
pub enum ProxyError {
    /// A protected endpoint was called without a session token.
    AuthAbsent,
    /// The inbound payload failed schema checks.
    Validation { fields: FieldErrors },
    /// The backend answered with a non-success status.
    Backend {
        status: StatusCode,
        upstream: Option<serde_json::Value>,
    },
    /// The backend could not be reached or the call failed mid-flight.
    Network { details: String },
    /// The backend did not answer in time.
    Timeout,
    /// The backend answered success with a body that is not JSON.
    MalformedUpstream { details: String },
    /// A resource the route depends on does not exist.
    ResourceNotFound { resource: String },
}

impl ProxyError {
    /// Shorthand for a validation failure on one field.
    #[must_use]
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            fields: FieldErrors::single(field, message),
        }
    }

    /// Machine-readable kind used in the error body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthAbsent => "auth_absent",
            Self::Validation { .. } => "validation",
            Self::Backend { .. } => "backend",
            Self::Network { .. } => "network",
            Self::Timeout => "timeout",
            Self::MalformedUpstream { .. } => "malformed_upstream",
            Self::ResourceNotFound { .. } => "not_found",
        }
    }

    /// Status code under `mode`.
    #[must_use]
    pub fn status(&self, mode: StatusMode) -> StatusCode {
        if mode == StatusMode::Legacy {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match self {
            Self::AuthAbsent => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Backend { status, .. }
                if status.is_client_error() || status.is_server_error() =>
            {
                *status
            }
            // Unfollowed redirects and other non-error statuses.
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
            Self::Network { .. } | Self::MalformedUpstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Serializable body describing this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let (fields, status, upstream) = match self {
            Self::Validation { fields } => (Some(fields.clone()), None, None),
            Self::Backend { status, upstream } => (None, Some(status.as_u16()), upstream.clone()),
            _ => (None, None, None),
        };
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            fields,
            status,
            upstream,
        }
    }

    /// Logs the failure and renders it with the given status.
    #[must_use]
    pub fn respond_with(self, status: StatusCode) -> Response {
        match &self {
            Self::AuthAbsent | Self::Validation { .. } => {
                tracing::debug!(kind = self.kind(), error = %self, "Rejected inbound request");
            }
            Self::ResourceNotFound { .. } | Self::Backend { .. } => {
                tracing::warn!(kind = self.kind(), error = %self, "Backend call did not succeed");
            }
            _ => {
                tracing::error!(kind = self.kind(), error = %self, "Backend call failed");
            }
        }
        (status, Json(self.body())).into_response()
    }

    /// Renders the error under `mode`.
    #[must_use]
    pub fn into_response_with(self, mode: StatusMode) -> Response {
        let status = self.status(mode);
        self.respond_with(status)
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthAbsent => write!(f, "no session token for a protected endpoint"),
            Self::Validation { fields } => {
                write!(f, "payload rejected on {} field(s)", fields.len())
            }
            Self::Backend { status, .. } => write!(f, "backend answered {status}"),
            Self::Network { details } => write!(f, "backend unreachable: {details}"),
            Self::Timeout => write!(f, "backend did not answer in time"),
            Self::MalformedUpstream { details } => {
                write!(f, "backend returned an unreadable body: {details}")
            }
            Self::ResourceNotFound { resource } => write!(f, "{resource} not found"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<BackendError> for ProxyError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout { .. } => Self::Timeout,
            BackendError::InvalidBody { details } => Self::MalformedUpstream { details },
            other => Self::Network {
                details: other.to_string(),
            },
        }
    }
}

impl From<FieldErrors> for ProxyError {
    fn from(fields: FieldErrors) -> Self {
        Self::Validation { fields }
    }
}

/// JSON body returned for every failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.insert("name", "Le nom est obligatoire");
        errors.insert("name", "Le nom est trop court");
        assert_eq!(errors.get("name"), Some("Le nom est obligatoire"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
        assert!(FieldErrors::single("code", "x").into_result().is_err());
    }

    #[test]
    fn legacy_mode_answers_500_for_everything() {
        let errors = [
            ProxyError::AuthAbsent,
            ProxyError::invalid("name", "short"),
            ProxyError::ResourceNotFound {
                resource: "document file".into(),
            },
            ProxyError::Timeout,
        ];
        for err in errors {
            assert_eq!(
                err.status(StatusMode::Legacy),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn strict_mode_turns_backend_redirects_into_bad_gateway() {
        for status in [StatusCode::FOUND, StatusCode::NOT_MODIFIED, StatusCode::CONTINUE] {
            let err = ProxyError::Backend {
                status,
                upstream: None,
            };
            assert_eq!(err.status(StatusMode::Strict), StatusCode::BAD_GATEWAY);
        }
        let err = ProxyError::Backend {
            status: StatusCode::SERVICE_UNAVAILABLE,
            upstream: None,
        };
        assert_eq!(err.status(StatusMode::Strict), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn strict_mode_maps_kinds() {
        assert_eq!(
            ProxyError::AuthAbsent.status(StatusMode::Strict),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::invalid("name", "short").status(StatusMode::Strict),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ProxyError::Backend {
                status: StatusCode::CONFLICT,
                upstream: None
            }
            .status(StatusMode::Strict),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ProxyError::ResourceNotFound {
                resource: "document".into()
            }
            .status(StatusMode::Strict),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn validation_body_lists_fields() {
        let body = ProxyError::invalid("name", "Le nom est trop court").body();
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["fields"]["name"], "Le nom est trop court");
        assert!(json.get("upstream").is_none());
    }

    #[test]
    fn backend_body_carries_upstream_payload() {
        let body = ProxyError::Backend {
            status: StatusCode::NOT_FOUND,
            upstream: Some(serde_json::json!({"message": "Branch not found"})),
        }
        .body();
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["status"], 404);
        assert_eq!(json["upstream"]["message"], "Branch not found");
    }

    #[test]
    fn backend_timeouts_become_timeout_errors() {
        let err: ProxyError = BackendError::Timeout {
            path: "/branches".into(),
        }
        .into();
        assert_eq!(err.kind(), "timeout");
    }
}
