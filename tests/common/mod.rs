//! Shared helpers for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use wayfarer::endpoint::{handler_fn, Handler, Reply};
use wayfarer::RequestContext;

/// A GET-shaped request context for a path.
pub fn request(method: Method, path: &str) -> RequestContext {
    RequestContext::new(method, path, HeaderMap::new(), "", Bytes::new(), None)
}

/// A request context with a JSON body.
#[allow(dead_code)]
pub fn json_request(method: Method, path: &str, body: serde_json::Value) -> RequestContext {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        "application/json".parse().unwrap(),
    );
    RequestContext::new(
        method,
        path,
        headers,
        "",
        Bytes::from(body.to_string()),
        None,
    )
}

/// A request context carrying an Authorization header.
#[allow(dead_code)]
pub fn authorized_request(method: Method, path: &str, token: &str) -> RequestContext {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    RequestContext::new(method, path, headers, "", Bytes::new(), None)
}

/// A handler that records how many times it ran.
#[allow(dead_code)]
pub fn counting_handler(payload: serde_json::Value) -> (Arc<dyn Handler>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let handler = handler_fn(move |_ctx| {
        let seen = seen.clone();
        let payload = payload.clone();
        Box::pin(async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Reply::Raw(payload))
        })
    });
    (handler, calls)
}

/// A handler that echoes its extracted path variables.
#[allow(dead_code)]
pub fn echo_params_handler() -> Arc<dyn Handler> {
    handler_fn(|ctx| {
        Box::pin(async move {
            let params: serde_json::Map<String, serde_json::Value> = ctx
                .path_params()
                .iter()
                .map(|(name, value)| (name.to_string(), serde_json::Value::from(value)))
                .collect();
            Ok(Reply::Raw(serde_json::Value::Object(params)))
        })
    })
}
