//! SCIM 2.0 Error Types
//!
//! This module defines the error taxonomy used by the schema, filter and
//! PATCH engines, and the RFC 7644 Section 3.12 error body it maps onto.

use http::StatusCode;
use serde::{Deserialize, Serialize};

use super::types::SCHEMA_ERROR;

/// Errors produced by the SCIM engine.
///
/// Every variant carries a detail string that is safe to return to the
/// client verbatim. None of these are logged inside the engine; they are
/// always handed back to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScimError {
    /// Malformed or schema-inconsistent filter or path
    #[error("{0}")]
    InvalidFilter(String),

    /// Value fails type coercion or required-ness against its attribute
    #[error("{0}")]
    InvalidValue(String),

    /// PATCH remove without a path
    #[error("{0}")]
    NoTarget(String),

    /// Malformed request body or operation shape
    #[error("{0}")]
    InvalidSyntax(String),

    /// PATCH path names an attribute the schema does not define
    #[error("{0}")]
    InvalidPath(String),

    /// Attempt to modify a read-only attribute
    #[error("{0}")]
    Mutability(String),

    /// Request exceeds a configured operation limit
    #[error("{0}")]
    TooMany(String),
}

impl ScimError {
    pub fn invalid_filter(detail: impl Into<String>) -> Self {
        Self::InvalidFilter(detail.into())
    }

    pub fn invalid_value(detail: impl Into<String>) -> Self {
        Self::InvalidValue(detail.into())
    }

    pub fn no_target(detail: impl Into<String>) -> Self {
        Self::NoTarget(detail.into())
    }

    pub fn invalid_syntax(detail: impl Into<String>) -> Self {
        Self::InvalidSyntax(detail.into())
    }

    pub fn invalid_path(detail: impl Into<String>) -> Self {
        Self::InvalidPath(detail.into())
    }

    pub fn mutability(detail: impl Into<String>) -> Self {
        Self::Mutability(detail.into())
    }

    /// The RFC 7644 `scimType` token for this error.
    pub fn scim_type(&self) -> ScimErrorType {
        match self {
            ScimError::InvalidFilter(_) => ScimErrorType::InvalidFilter,
            ScimError::InvalidValue(_) => ScimErrorType::InvalidValue,
            ScimError::NoTarget(_) => ScimErrorType::NoTarget,
            ScimError::InvalidSyntax(_) => ScimErrorType::InvalidSyntax,
            ScimError::InvalidPath(_) => ScimErrorType::InvalidPath,
            ScimError::Mutability(_) => ScimErrorType::Mutability,
            ScimError::TooMany(_) => ScimErrorType::TooMany,
        }
    }

    /// HTTP status the surrounding server should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            ScimError::TooMany(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Human-readable detail
    pub fn detail(&self) -> &str {
        match self {
            ScimError::InvalidFilter(d)
            | ScimError::InvalidValue(d)
            | ScimError::NoTarget(d)
            | ScimError::InvalidSyntax(d)
            | ScimError::InvalidPath(d)
            | ScimError::Mutability(d)
            | ScimError::TooMany(d) => d,
        }
    }

    /// Prefix the detail with context, keeping the error class.
    pub(crate) fn with_context(self, context: impl std::fmt::Display) -> Self {
        let wrap = |d: String| format!("{}: {}", context, d);
        match self {
            ScimError::InvalidFilter(d) => ScimError::InvalidFilter(wrap(d)),
            ScimError::InvalidValue(d) => ScimError::InvalidValue(wrap(d)),
            ScimError::NoTarget(d) => ScimError::NoTarget(wrap(d)),
            ScimError::InvalidSyntax(d) => ScimError::InvalidSyntax(wrap(d)),
            ScimError::InvalidPath(d) => ScimError::InvalidPath(wrap(d)),
            ScimError::Mutability(d) => ScimError::Mutability(wrap(d)),
            ScimError::TooMany(d) => ScimError::TooMany(wrap(d)),
        }
    }
}

impl From<serde_json::Error> for ScimError {
    fn from(e: serde_json::Error) -> Self {
        ScimError::InvalidSyntax(e.to_string())
    }
}

/// SCIM error response per RFC 7644.
///
/// All SCIM errors are returned in this format with appropriate HTTP status codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    /// SCIM schema URIs (always contains the Error schema)
    pub schemas: Vec<String>,

    /// HTTP status code as a string (e.g., "400", "413")
    pub status: String,

    /// SCIM-specific error type (optional, per RFC 7644)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimErrorType>,

    /// Human-readable error detail
    pub detail: String,
}

impl ScimErrorResponse {
    fn new(
        status: StatusCode,
        scim_type: Option<ScimErrorType>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            schemas: vec![SCHEMA_ERROR.to_string()],
            status: status.as_u16().to_string(),
            scim_type,
            detail: detail.into(),
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status.parse().unwrap_or(500))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ScimError> for ScimErrorResponse {
    fn from(err: ScimError) -> Self {
        Self::new(err.status(), Some(err.scim_type()), err.detail())
    }
}

impl From<&ScimError> for ScimErrorResponse {
    fn from(err: &ScimError) -> Self {
        Self::new(err.status(), Some(err.scim_type()), err.detail())
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ScimErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        (status, axum::Json(self)).into_response()
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ScimError {
    fn into_response(self) -> axum::response::Response {
        ScimErrorResponse::from(self).into_response()
    }
}

/// SCIM error types per RFC 7644 Section 3.12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimErrorType {
    /// Filter syntax is invalid or names attributes the schema lacks
    InvalidFilter,

    /// Request body has invalid JSON syntax
    InvalidSyntax,

    /// PATCH remove operation missing required path
    NoTarget,

    /// PATCH path is malformed or unresolvable
    InvalidPath,

    /// Attempt to modify read-only or immutable attribute
    Mutability,

    /// Attribute value is invalid for its type
    InvalidValue,

    /// Request payload too large
    TooMany,
}

impl std::fmt::Display for ScimErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScimErrorType::InvalidFilter => write!(f, "invalidFilter"),
            ScimErrorType::InvalidSyntax => write!(f, "invalidSyntax"),
            ScimErrorType::NoTarget => write!(f, "noTarget"),
            ScimErrorType::InvalidPath => write!(f, "invalidPath"),
            ScimErrorType::Mutability => write!(f, "mutability"),
            ScimErrorType::InvalidValue => write!(f, "invalidValue"),
            ScimErrorType::TooMany => write!(f, "tooMany"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_wire_shape() {
        let err = ScimError::invalid_filter("unknown attribute 'nope'");
        let body = ScimErrorResponse::from(err);

        assert_eq!(body.status, "400");
        assert_eq!(body.scim_type, Some(ScimErrorType::InvalidFilter));
        assert_eq!(body.schemas, vec![SCHEMA_ERROR.to_string()]);

        let json = serde_json::to_string_pretty(&body).unwrap();
        assert!(json.contains("\"scimType\": \"invalidFilter\""));
        assert!(json.contains("\"status\": \"400\""));
        assert!(json.contains("\"detail\": \"unknown attribute 'nope'\""));
    }

    #[test]
    fn test_no_target_is_400() {
        let err = ScimError::no_target("remove operation requires a path");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.scim_type(), ScimErrorType::NoTarget);
    }

    #[test]
    fn test_too_many_is_413() {
        let err = ScimError::TooMany("too many operations".into());
        let body = ScimErrorResponse::from(&err);
        assert_eq!(body.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_with_context_keeps_class() {
        let err = ScimError::invalid_value("expected string").with_context("nickName");
        assert_eq!(err.scim_type(), ScimErrorType::InvalidValue);
        assert_eq!(err.detail(), "nickName: expected string");
    }

    #[test]
    fn test_scim_error_type_display() {
        assert_eq!(format!("{}", ScimErrorType::InvalidFilter), "invalidFilter");
        assert_eq!(format!("{}", ScimErrorType::InvalidPath), "invalidPath");
        assert_eq!(format!("{}", ScimErrorType::NoTarget), "noTarget");
    }

    #[test]
    fn test_json_error_maps_to_invalid_syntax() {
        let err: ScimError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.scim_type(), ScimErrorType::InvalidSyntax);
    }
}
