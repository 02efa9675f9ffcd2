//! Authentication strategies.
//!
//! The engine invokes the configured strategy when an endpoint declares
//! `auth`; on success the resolved identity is attached to the request
//! context. Strategies are injected, not ambient.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::http::{Identity, RequestContext};

/// A pluggable authentication strategy.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve the request's identity or fail with an authentication error.
    async fn authenticate(&self, ctx: &RequestContext) -> Result<Identity, DispatchError>;
}

/// Bearer-token authentication against a static token table.
///
/// Looks for `Authorization: Bearer <token>` and resolves the identity
/// registered for that token.
#[derive(Default)]
pub struct BearerAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl BearerAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

#[async_trait]
impl Authenticator for BearerAuthenticator {
    async fn authenticate(&self, ctx: &RequestContext) -> Result<Identity, DispatchError> {
        let header = ctx
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                DispatchError::Authentication("missing authorization header".to_string())
            })?;

        let mut parts = header.split_whitespace();
        let keyword = parts.next().unwrap_or_default();
        let token = parts.next();
        let (Some(token), None) = (token, parts.next()) else {
            return Err(DispatchError::Authentication(
                "authorization header must contain 2 parts".to_string(),
            ));
        };
        if !keyword.eq_ignore_ascii_case("bearer") {
            return Err(DispatchError::Authentication(
                "authorization keyword is not valid".to_string(),
            ));
        }

        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| DispatchError::Authentication("unknown token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};

    fn request_with_auth(value: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(axum::http::header::AUTHORIZATION, value.parse().unwrap());
        }
        RequestContext::new(Method::GET, "x/", headers, "", Bytes::new(), None)
    }

    fn authenticator() -> BearerAuthenticator {
        BearerAuthenticator::new().with_token(
            "sesame",
            Identity {
                id: "user-1".into(),
                is_admin: false,
                claims: serde_json::Value::Null,
            },
        )
    }

    #[tokio::test]
    async fn test_valid_token() {
        let ctx = request_with_auth(Some("Bearer sesame"));
        let identity = authenticator().authenticate(&ctx).await.unwrap();
        assert_eq!(identity.id, "user-1");
    }

    #[tokio::test]
    async fn test_missing_header() {
        let ctx = request_with_auth(None);
        let err = authenticator().authenticate(&ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        for value in ["Bearer", "Bearer a b", "Basic sesame"] {
            let ctx = request_with_auth(Some(value));
            let err = authenticator().authenticate(&ctx).await.unwrap_err();
            assert!(matches!(err, DispatchError::Authentication(_)), "{value}");
        }
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let ctx = request_with_auth(Some("Bearer wrong"));
        let err = authenticator().authenticate(&ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::Authentication(_)));
    }
}
