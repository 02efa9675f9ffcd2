//! Endpoint metadata and handler variants.
//!
//! # Responsibilities
//! - Describe what a resolved route executes: a single handler with a
//!   declared method set, a per-verb handler table, or a WebSocket handler
//! - Carry the declared cross-cutting metadata (auth, permissions, throttle,
//!   cache, input schema, output transform, private middleware)
//!
//! # Design Decisions
//! - Constructed once at configuration time via the builder; immutable and
//!   looked up, never mutated, during request handling
//! - Handlers are trait objects so user code stays free of generics at the
//!   route-declaration seam

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use futures_util::future::BoxFuture;

use crate::error::DispatchError;
use crate::http::{RequestContext, Response};
use crate::middleware::Middleware;
use crate::security::{Permission, Throttle};
use crate::validation::Schema;
use crate::ws::SocketHandler;

/// What a handler hands back: a raw JSON value the dispatcher normalizes,
/// or a fully formed response taken as-is.
pub enum Reply {
    Raw(serde_json::Value),
    Full(Response),
}

impl Reply {
    pub fn raw(value: impl Into<serde_json::Value>) -> Self {
        Reply::Raw(value.into())
    }
}

impl From<serde_json::Value> for Reply {
    fn from(value: serde_json::Value) -> Self {
        Reply::Raw(value)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Full(response)
    }
}

/// A request handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &RequestContext) -> Result<Reply, DispatchError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a RequestContext) -> BoxFuture<'a, Result<Reply, DispatchError>>
        + Send
        + Sync,
{
    async fn call(&self, ctx: &RequestContext) -> Result<Reply, DispatchError> {
        (self.0)(ctx).await
    }
}

/// Wrap a closure as a handler.
///
/// ```ignore
/// let list = handler_fn(|_ctx| Box::pin(async { Ok(Reply::raw(serde_json::json!([]))) }));
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a RequestContext) -> BoxFuture<'a, Result<Reply, DispatchError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}

/// Per-verb handler table; a verb with no entry is `MethodNotAllowed`.
#[derive(Default)]
pub struct MethodTable {
    get: Option<Arc<dyn Handler>>,
    post: Option<Arc<dyn Handler>>,
    put: Option<Arc<dyn Handler>>,
    patch: Option<Arc<dyn Handler>>,
    delete: Option<Arc<dyn Handler>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(mut self, handler: Arc<dyn Handler>) -> Self {
        self.get = Some(handler);
        self
    }

    pub fn post(mut self, handler: Arc<dyn Handler>) -> Self {
        self.post = Some(handler);
        self
    }

    pub fn put(mut self, handler: Arc<dyn Handler>) -> Self {
        self.put = Some(handler);
        self
    }

    pub fn patch(mut self, handler: Arc<dyn Handler>) -> Self {
        self.patch = Some(handler);
        self
    }

    pub fn delete(mut self, handler: Arc<dyn Handler>) -> Self {
        self.delete = Some(handler);
        self
    }

    fn handler_for(&self, method: &Method) -> Option<Arc<dyn Handler>> {
        if method == Method::GET {
            self.get.clone()
        } else if method == Method::POST {
            self.post.clone()
        } else if method == Method::PUT {
            self.put.clone()
        } else if method == Method::PATCH {
            self.patch.clone()
        } else if method == Method::DELETE {
            self.delete.clone()
        } else {
            None
        }
    }

    fn declared_methods(&self) -> HashSet<Method> {
        let mut methods = HashSet::new();
        if self.get.is_some() {
            methods.insert(Method::GET);
        }
        if self.post.is_some() {
            methods.insert(Method::POST);
        }
        if self.put.is_some() {
            methods.insert(Method::PUT);
        }
        if self.patch.is_some() {
            methods.insert(Method::PATCH);
        }
        if self.delete.is_some() {
            methods.insert(Method::DELETE);
        }
        methods
    }
}

/// How the endpoint executes.
pub enum EndpointKind {
    /// One handler, optionally restricted to a declared method set.
    Single {
        handler: Arc<dyn Handler>,
        methods: Option<HashSet<Method>>,
    },
    /// One handler per HTTP verb.
    ByVerb(MethodTable),
    /// A persistent WebSocket endpoint.
    Socket(Arc<dyn SocketHandler>),
}

/// Cache rule: enabled with an optional endpoint-specific expiry (the
/// engine's configured default applies otherwise).
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl: Option<Duration>,
}

/// Declared output post-processing applied to raw handler replies.
pub trait ResponseTransform: Send + Sync {
    fn transform(&self, data: serde_json::Value) -> Result<serde_json::Value, DispatchError>;
}

/// A resolved handler plus its declared dispatch metadata.
pub struct Endpoint {
    kind: EndpointKind,
    auth: bool,
    permissions: Vec<Arc<dyn Permission>>,
    throttle: Option<Throttle>,
    cache: Option<CachePolicy>,
    schema: Option<Arc<dyn Schema>>,
    transform: Option<Arc<dyn ResponseTransform>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Endpoint {
    /// Start building a single-handler endpoint (any method unless a set is
    /// declared).
    pub fn single(handler: Arc<dyn Handler>) -> EndpointBuilder {
        EndpointBuilder::new(EndpointKind::Single { handler, methods: None })
    }

    /// Start building a per-verb endpoint.
    pub fn by_verb(table: MethodTable) -> EndpointBuilder {
        EndpointBuilder::new(EndpointKind::ByVerb(table))
    }

    /// Start building a WebSocket endpoint.
    pub fn socket(handler: Arc<dyn SocketHandler>) -> EndpointBuilder {
        EndpointBuilder::new(EndpointKind::Socket(handler))
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }

    pub fn is_socket(&self) -> bool {
        matches!(self.kind, EndpointKind::Socket(_))
    }

    pub fn socket_handler(&self) -> Option<Arc<dyn SocketHandler>> {
        match &self.kind {
            EndpointKind::Socket(handler) => Some(handler.clone()),
            _ => None,
        }
    }

    /// The declared method set, or `None` for "any method".
    pub fn allowed_methods(&self) -> Option<HashSet<Method>> {
        match &self.kind {
            EndpointKind::Single { methods, .. } => methods.clone(),
            EndpointKind::ByVerb(table) => Some(table.declared_methods()),
            EndpointKind::Socket(_) => None,
        }
    }

    pub fn handler_for(&self, method: &Method) -> Option<Arc<dyn Handler>> {
        match &self.kind {
            EndpointKind::Single { handler, .. } => Some(handler.clone()),
            EndpointKind::ByVerb(table) => table.handler_for(method),
            EndpointKind::Socket(_) => None,
        }
    }

    pub fn requires_auth(&self) -> bool {
        self.auth
    }

    pub fn permissions(&self) -> &[Arc<dyn Permission>] {
        &self.permissions
    }

    pub fn throttle(&self) -> Option<Throttle> {
        self.throttle
    }

    pub fn cache(&self) -> Option<CachePolicy> {
        self.cache
    }

    pub fn schema(&self) -> Option<&Arc<dyn Schema>> {
        self.schema.as_ref()
    }

    pub fn transform(&self) -> Option<&Arc<dyn ResponseTransform>> {
        self.transform.as_ref()
    }

    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }
}

/// Builder for endpoint declarations.
pub struct EndpointBuilder {
    kind: EndpointKind,
    auth: bool,
    permissions: Vec<Arc<dyn Permission>>,
    throttle: Option<Throttle>,
    cache: Option<CachePolicy>,
    schema: Option<Arc<dyn Schema>>,
    transform: Option<Arc<dyn ResponseTransform>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl EndpointBuilder {
    fn new(kind: EndpointKind) -> Self {
        Self {
            kind,
            auth: false,
            permissions: Vec::new(),
            throttle: None,
            cache: None,
            schema: None,
            transform: None,
            middleware: Vec::new(),
        }
    }

    /// Restrict a single-handler endpoint to the given methods.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        if let EndpointKind::Single { methods: slot, .. } = &mut self.kind {
            *slot = Some(methods.into_iter().collect());
        }
        self
    }

    pub fn auth(mut self, required: bool) -> Self {
        self.auth = required;
        self
    }

    pub fn permission(mut self, permission: Arc<dyn Permission>) -> Self {
        self.permissions.push(permission);
        self
    }

    pub fn throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Enable caching with the engine-wide default expiry.
    pub fn cache(mut self) -> Self {
        self.cache = Some(CachePolicy { ttl: None });
        self
    }

    pub fn cache_for(mut self, ttl: Duration) -> Self {
        self.cache = Some(CachePolicy { ttl: Some(ttl) });
        self
    }

    pub fn schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn transform(mut self, transform: Arc<dyn ResponseTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Append a private middleware (wraps the handler inside the globals).
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn build(self) -> Arc<Endpoint> {
        Arc::new(Endpoint {
            kind: self.kind,
            auth: self.auth,
            permissions: self.permissions,
            throttle: self.throttle,
            cache: self.cache,
            schema: self.schema,
            transform: self.transform,
            middleware: self.middleware,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A do-nothing endpoint for routing tests.
    pub(crate) fn plain_endpoint() -> Arc<Endpoint> {
        Endpoint::single(handler_fn(|_ctx| {
            Box::pin(async { Ok(Reply::Raw(serde_json::Value::Null)) })
        }))
        .build()
    }
}
