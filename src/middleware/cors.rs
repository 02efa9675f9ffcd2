//! Cross-origin resource sharing headers.
//!
//! Stamps the configured `Access-Control-*` headers on every response.
//! Preflight requests themselves are answered by the dispatcher before any
//! lifecycle stage runs; this middleware decorates those replies too.

use async_trait::async_trait;

use crate::config::CorsConfig;
use crate::error::DispatchError;
use crate::http::{RequestContext, Response};
use crate::middleware::Middleware;

pub struct CorsMiddleware {
    config: CorsConfig,
}

impl CorsMiddleware {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn allow_origin(&self, request_origin: Option<&str>) -> String {
        let origins = &self.config.allow_origins;
        if origins.iter().any(|o| o == "*") {
            return "*".to_string();
        }
        if let Some(origin) = request_origin {
            if origins.iter().any(|o| o == origin) {
                return origin.to_string();
            }
        }
        origins.first().cloned().unwrap_or_else(|| "*".to_string())
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn after(
        &self,
        ctx: &RequestContext,
        response: &mut Response,
    ) -> Result<(), DispatchError> {
        let request_origin = ctx
            .headers()
            .get(axum::http::header::ORIGIN)
            .and_then(|v| v.to_str().ok());

        response.insert_header("access-control-allow-origin", self.allow_origin(request_origin));
        response.insert_header(
            "access-control-allow-methods",
            self.config.allow_methods.join(", "),
        );
        response.insert_header(
            "access-control-allow-headers",
            self.config.allow_headers.join(", "),
        );
        response.insert_header("access-control-max-age", self.config.max_age_secs.to_string());
        if self.config.allow_credentials {
            response.insert_header("access-control-allow-credentials", "true");
        }
        if !self.config.expose_headers.is_empty() {
            response.insert_header(
                "access-control-expose-headers",
                self.config.expose_headers.join(", "),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};

    fn context_with_origin(origin: &str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::ORIGIN, origin.parse().unwrap());
        RequestContext::new(Method::GET, "x/", headers, "", Bytes::new(), None)
    }

    #[tokio::test]
    async fn test_wildcard_origin() {
        let cors = CorsMiddleware::new(CorsConfig::default());
        let ctx = context_with_origin("https://app.example");
        let mut response = Response::json(&serde_json::json!({}));
        cors.after(&ctx, &mut response).await.unwrap();
        assert_eq!(response.header("access-control-allow-origin").unwrap(), "*");
        assert!(response.header("access-control-allow-methods").is_some());
    }

    #[tokio::test]
    async fn test_origin_echoed_when_listed() {
        let config = CorsConfig {
            allow_origins: vec!["https://app.example".to_string(), "https://other.example".to_string()],
            ..CorsConfig::default()
        };
        let cors = CorsMiddleware::new(config);

        let ctx = context_with_origin("https://other.example");
        let mut response = Response::json(&serde_json::json!({}));
        cors.after(&ctx, &mut response).await.unwrap();
        assert_eq!(
            response.header("access-control-allow-origin").unwrap(),
            "https://other.example"
        );

        let ctx = context_with_origin("https://stranger.example");
        let mut response = Response::json(&serde_json::json!({}));
        cors.after(&ctx, &mut response).await.unwrap();
        assert_eq!(
            response.header("access-control-allow-origin").unwrap(),
            "https://app.example"
        );
    }

    #[tokio::test]
    async fn test_credentials_flag() {
        let config = CorsConfig {
            allow_credentials: true,
            expose_headers: vec!["x-request-id".to_string()],
            ..CorsConfig::default()
        };
        let cors = CorsMiddleware::new(config);
        let ctx = context_with_origin("https://app.example");
        let mut response = Response::json(&serde_json::json!({}));
        cors.after(&ctx, &mut response).await.unwrap();
        assert_eq!(
            response.header("access-control-allow-credentials").unwrap(),
            "true"
        );
        assert_eq!(
            response.header("access-control-expose-headers").unwrap(),
            "x-request-id"
        );
    }
}
