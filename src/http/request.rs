//! Per-request context.
//!
//! # Responsibilities
//! - Carry method, normalized path, headers, raw query string, body bytes
//! - Lazily parse the body by content type (JSON, urlencoded form)
//! - Hold extracted path variables, the authenticated identity, and the
//!   validated-data slot filled by input validation
//!
//! # Design Decisions
//! - One context per request, owned by the dispatching task, never shared
//! - Body chunks are concatenated by the transport adapter before the
//!   context is built; the parse itself happens on demand

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};

use crate::routing::PathParams;

/// Authenticated identity attached to a request by the authentication stage.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable identifier, used in cache/throttle fingerprints.
    pub id: String,
    pub is_admin: bool,
    /// Arbitrary claims the authenticator resolved.
    pub claims: serde_json::Value,
}

/// Request body after content-type aware parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyData {
    Empty,
    Json(serde_json::Value),
    Form(BTreeMap<String, String>),
    /// Unknown content type; the payload is handed through untouched.
    Raw(Bytes),
}

/// Everything the lifecycle needs to know about one in-flight request.
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: String,
    body: Bytes,
    peer: Option<SocketAddr>,
    path_params: PathParams,
    user: Option<Identity>,
    validated: Option<serde_json::Value>,
}

impl RequestContext {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers: HeaderMap,
        query: impl Into<String>,
        body: Bytes,
        peer: Option<SocketAddr>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            query: query.into(),
            body,
            peer,
            path_params: PathParams::default(),
            user: None,
            validated: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw query string, exactly as received (no decoding).
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub fn set_path_params(&mut self, params: PathParams) {
        self.path_params = params;
    }

    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: Identity) {
        self.user = Some(user);
    }

    /// Validated input, present after the validation stage ran a schema.
    pub fn validated(&self) -> Option<&serde_json::Value> {
        self.validated.as_ref()
    }

    pub fn set_validated(&mut self, data: serde_json::Value) {
        self.validated = Some(data);
    }

    /// Identity for fingerprinting: the authenticated user id, else the
    /// client address, else a fixed marker for address-less transports.
    pub fn fingerprint_identity(&self) -> String {
        if let Some(user) = &self.user {
            return user.id.clone();
        }
        match self.peer {
            Some(addr) => addr.ip().to_string(),
            None => "anonymous".to_string(),
        }
    }

    /// Parse the body according to its `Content-Type` header.
    ///
    /// Unknown content types are passed through as raw bytes with a warning,
    /// leaving interpretation to the handler.
    pub fn data(&self) -> BodyData {
        if self.body.is_empty() {
            return BodyData::Empty;
        }
        let content_type = self
            .headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json");
        let mime = content_type.split(';').next().unwrap_or("").trim();

        match mime {
            "" | "application/json" => match serde_json::from_slice(&self.body) {
                Ok(value) => BodyData::Json(value),
                Err(_) => BodyData::Raw(self.body.clone()),
            },
            "application/x-www-form-urlencoded" => BodyData::Form(parse_form(&self.body)),
            other => {
                tracing::warn!(content_type = %other, "Unsupported content type, passing body through");
                BodyData::Raw(self.body.clone())
            }
        }
    }
}

fn parse_form(body: &[u8]) -> BTreeMap<String, String> {
    let text = String::from_utf8_lossy(body);
    let mut fields = BTreeMap::new();
    for pair in text.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_default();
        let value = value.replace('+', " ");
        let value = urlencoding::decode(&value)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_default();
        fields.insert(key, value);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(content_type: &str, body: &'static [u8]) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            content_type.parse().unwrap(),
        );
        RequestContext::new(
            Method::POST,
            "thing/",
            headers,
            "",
            Bytes::from_static(body),
            None,
        )
    }

    #[test]
    fn test_json_body() {
        let ctx = context_with("application/json", br#"{"name": "ali"}"#);
        assert_eq!(ctx.data(), BodyData::Json(serde_json::json!({"name": "ali"})));
    }

    #[test]
    fn test_form_body() {
        let ctx = context_with("application/x-www-form-urlencoded", b"name=ali+reza&age=30");
        let BodyData::Form(fields) = ctx.data() else {
            panic!("expected form data");
        };
        assert_eq!(fields.get("name").unwrap(), "ali reza");
        assert_eq!(fields.get("age").unwrap(), "30");
    }

    #[test]
    fn test_unknown_content_type_passes_through() {
        let ctx = context_with("application/octet-stream", b"\x00\x01");
        assert_eq!(ctx.data(), BodyData::Raw(Bytes::from_static(b"\x00\x01")));
    }

    #[test]
    fn test_empty_body() {
        let ctx = RequestContext::new(
            Method::GET,
            "thing/",
            HeaderMap::new(),
            "a=1",
            Bytes::new(),
            None,
        );
        assert_eq!(ctx.data(), BodyData::Empty);
        assert_eq!(ctx.query(), "a=1");
    }

    #[test]
    fn test_fingerprint_prefers_user() {
        let mut ctx = RequestContext::new(
            Method::GET,
            "thing/",
            HeaderMap::new(),
            "",
            Bytes::new(),
            Some("10.0.0.7:1234".parse().unwrap()),
        );
        assert_eq!(ctx.fingerprint_identity(), "10.0.0.7");
        ctx.set_user(Identity {
            id: "user-9".into(),
            is_admin: false,
            claims: serde_json::Value::Null,
        });
        assert_eq!(ctx.fingerprint_identity(), "user-9");
    }
}
