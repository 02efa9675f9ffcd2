//! The per-request lifecycle state machine.
//!
//! Ten states in strict order, each a possible early exit; every stage
//! returns `Result` and the first error short-circuits the rest. The
//! middleware chain wraps the whole sequence, so `after` hooks observe the
//! converted error response no matter which stage bailed.

use std::sync::Arc;

use axum::http::Method;

use crate::cache::{response_cache_key, CachedResponse};
use crate::dispatch::Engine;
use crate::endpoint::{Endpoint, Reply};
use crate::error::DispatchError;
use crate::http::{RequestContext, Response};
use crate::observability::metrics;

pub(crate) async fn execute(
    engine: &Engine,
    endpoint: &Arc<Endpoint>,
    ctx: &mut RequestContext,
) -> Result<Response, DispatchError> {
    // 1. Preflight: answered before anything else runs.
    if ctx.method() == Method::OPTIONS {
        return Ok(preflight(engine, endpoint));
    }

    // 2. Method check.
    if let Some(allowed) = endpoint.allowed_methods() {
        if !allowed.contains(ctx.method()) {
            return Err(DispatchError::MethodNotAllowed);
        }
    }

    // 3. Authentication.
    if endpoint.requires_auth() {
        let authenticator = engine.authenticator().ok_or_else(|| {
            DispatchError::Internal(
                "endpoint requires auth but no authenticator is configured".to_string(),
            )
        })?;
        let user = authenticator.authenticate(ctx).await?;
        ctx.set_user(user);
    }

    // 4. Authorization: first denial wins.
    for permission in endpoint.permissions() {
        if !permission.check(ctx).await {
            return Err(DispatchError::Authorization);
        }
    }

    // 5. Throttling: check-and-increment is a single atomic step inside the
    //    store.
    if let Some(throttle) = endpoint.throttle().or(engine.default_throttle()) {
        engine
            .throttle_store()
            .check_and_increment(&throttle, &ctx.fingerprint_identity(), ctx.path())
            .map_err(|err| {
                metrics::record_throttled(ctx.path());
                err
            })?;
    }

    // 6. Input validation, for write methods with a declared schema.
    let is_write = ctx.method() == Method::POST
        || ctx.method() == Method::PUT
        || ctx.method() == Method::PATCH;
    if is_write {
        if let Some(schema) = endpoint.schema() {
            let validated = schema
                .validate(&ctx.data())
                .map_err(DispatchError::BadRequest)?;
            ctx.set_validated(validated);
        }
    }

    // 7. Cache lookup: a fresh entry bypasses the handler entirely.
    let cache_ttl = endpoint
        .cache()
        .filter(|_| ctx.method() == Method::GET)
        .map(|policy| policy.ttl.unwrap_or_else(|| engine.default_cache_ttl()));
    let cache_key = cache_ttl.as_ref().map(|_| response_cache_key(ctx));
    if let Some(key) = &cache_key {
        if let Some(hit) = engine.cache_store().get(key) {
            metrics::record_cache(true);
            return Ok(Response::from_parts(hit.status, hit.headers, hit.body));
        }
        metrics::record_cache(false);
    }

    // 8. Handler invocation.
    let handler = endpoint
        .handler_for(ctx.method())
        .ok_or(DispatchError::MethodNotAllowed)?;
    let reply = handler.call(ctx).await?;

    // 9. Response normalization, plus declared output post-processing for
    //    raw replies.
    let response = match reply {
        Reply::Full(response) => response,
        Reply::Raw(value) => {
            let value = match endpoint.transform() {
                Some(transform) => transform.transform(value)?,
                None => value,
            };
            Response::json(&value)
        }
    };

    // 10. Cache population.
    if let (Some(key), Some(ttl)) = (cache_key, cache_ttl) {
        engine.cache_store().insert(
            key,
            CachedResponse {
                status: response.status(),
                headers: response.headers().clone(),
                body: response.body().to_vec(),
            },
            ttl,
        );
    }

    Ok(response)
}

/// Fixed reply for cross-origin preflight: the allowed method set and the
/// configured allowed headers.
fn preflight(engine: &Engine, endpoint: &Endpoint) -> Response {
    let methods = match endpoint.allowed_methods() {
        Some(allowed) => {
            let mut names: Vec<String> = allowed.iter().map(|m| m.to_string()).collect();
            names.sort();
            names.join(", ")
        }
        None => engine.config().cors.allow_methods.join(", "),
    };

    let mut response = Response::no_content(204);
    response.insert_header("allow", methods.clone());
    response.insert_header("access-control-allow-methods", methods);
    response.insert_header(
        "access-control-allow-headers",
        engine.config().cors.allow_headers.join(", "),
    );
    response
}
