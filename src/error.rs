//! Unified error handling for the dispatch engine.
//!
//! Every failure a request can hit maps to one `DispatchError` variant
//! carrying a status code and a JSON detail payload. The engine converts
//! errors into well-formed responses at the chain boundary; nothing raw
//! ever reaches the transport layer.

use std::collections::BTreeMap;

use thiserror::Error;

/// Field name → human-readable message, produced by input validation.
pub type FieldErrors = BTreeMap<String, String>;

/// Errors surfaced by the request lifecycle.
///
/// These are client-input or policy outcomes, not transient faults: the
/// dispatcher converts them directly into responses without retrying.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("permission denied")]
    Authorization,

    #[error("too many requests")]
    Throttled {
        /// Seconds until the current window resets.
        retry_after: u64,
        /// Unix timestamp of the window reset.
        reset_at: u64,
    },

    #[error("bad request")]
    BadRequest(FieldErrors),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NotFound => 404,
            DispatchError::MethodNotAllowed => 405,
            DispatchError::Authentication(_) => 401,
            DispatchError::Authorization => 403,
            DispatchError::Throttled { .. } => 429,
            DispatchError::BadRequest(_) => 400,
            DispatchError::Internal(_) => 500,
        }
    }

    /// Stable label for metrics.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::NotFound => "not_found",
            DispatchError::MethodNotAllowed => "method_not_allowed",
            DispatchError::Authentication(_) => "authentication",
            DispatchError::Authorization => "authorization",
            DispatchError::Throttled { .. } => "throttled",
            DispatchError::BadRequest(_) => "bad_request",
            DispatchError::Internal(_) => "internal",
        }
    }

    /// JSON detail payload sent to the client.
    ///
    /// Internal errors always collapse to a generic body; the underlying
    /// message is logged server-side only.
    pub fn detail(&self) -> serde_json::Value {
        match self {
            DispatchError::NotFound => serde_json::json!({"detail": "Not Found"}),
            DispatchError::MethodNotAllowed => serde_json::json!({"detail": "Method Not Allowed"}),
            DispatchError::Authentication(_) => {
                serde_json::json!({"detail": "Authentication Error"})
            }
            DispatchError::Authorization => serde_json::json!({"detail": "Permission Denied"}),
            DispatchError::Throttled { .. } => serde_json::json!({"detail": "Too Many Requests"}),
            DispatchError::BadRequest(fields) => serde_json::json!({"detail": fields}),
            DispatchError::Internal(_) => serde_json::json!({"detail": "Internal Server Error"}),
        }
    }

    /// Build an invalid-path-variable error naming the value and target type.
    pub fn invalid_path_variable(value: &str, target: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(
            "path".to_string(),
            format!("path variable '{value}' should be '{target}'"),
        );
        DispatchError::BadRequest(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(DispatchError::NotFound.status(), 404);
        assert_eq!(DispatchError::MethodNotAllowed.status(), 405);
        assert_eq!(DispatchError::Authentication("x".into()).status(), 401);
        assert_eq!(DispatchError::Authorization.status(), 403);
        assert_eq!(
            DispatchError::Throttled { retry_after: 1, reset_at: 0 }.status(),
            429
        );
        assert_eq!(DispatchError::BadRequest(FieldErrors::new()).status(), 400);
        assert_eq!(DispatchError::Internal("boom".into()).status(), 500);
    }

    #[test]
    fn test_internal_detail_is_generic() {
        let err = DispatchError::Internal("connection refused at 10.0.0.3".into());
        assert_eq!(
            err.detail(),
            serde_json::json!({"detail": "Internal Server Error"})
        );
    }

    #[test]
    fn test_bad_request_carries_field_map() {
        let mut fields = FieldErrors::new();
        fields.insert("name".into(), "required".into());
        let err = DispatchError::BadRequest(fields);
        assert_eq!(err.detail(), serde_json::json!({"detail": {"name": "required"}}));
    }
}
