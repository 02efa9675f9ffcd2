//! Response model and normalization.
//!
//! # Responsibilities
//! - Hold status, headers, and the serialized JSON body
//! - Convert lifecycle errors into well-formed responses
//! - Bridge into the transport layer's response type

use std::collections::BTreeMap;

use crate::error::DispatchError;

/// A normalized response: status code, header map, JSON body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Response {
    /// Serialize `data` as the JSON body of a 200 response.
    pub fn json(data: &serde_json::Value) -> Self {
        Self::with_status(data, 200)
    }

    pub fn with_status(data: &serde_json::Value, status: u16) -> Self {
        let body = serde_json::to_vec(data).unwrap_or_else(|_| b"null".to_vec());
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self { status, headers, body }
    }

    /// An empty-bodied response, used for preflight replies.
    pub fn no_content(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Rebuild a response from previously captured parts (cache replay).
    pub fn from_parts(status: u16, headers: BTreeMap<String, String>, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into().to_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

impl From<&DispatchError> for Response {
    fn from(err: &DispatchError) -> Self {
        let mut response = Response::with_status(&err.detail(), err.status());
        if let DispatchError::Throttled { retry_after, reset_at } = err {
            response.insert_header("retry-after", retry_after.to_string());
            response.insert_header("x-ratelimit-reset", reset_at.to_string());
        }
        response
    }
}

impl From<DispatchError> for Response {
    fn from(err: DispatchError) -> Self {
        Response::from(&err)
    }
}

/// Convert into the transport layer's response type.
impl From<Response> for axum::response::Response {
    fn from(response: Response) -> Self {
        let mut builder = axum::http::Response::builder().status(response.status);
        for (name, value) in &response.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(axum::body::Body::from(response.body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(500)
                    .body(axum::body::Body::from(
                        br#"{"detail": "Internal Server Error"}"#.as_slice(),
                    ))
                    .expect("static fallback response")
            })
    }
}
