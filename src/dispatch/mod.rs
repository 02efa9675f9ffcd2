//! The request-dispatch engine.
//!
//! # Responsibilities
//! - Own the finalized route trie and the injected services (authenticator,
//!   cache store, throttle store, connection registry)
//! - Resolve each request, compose its middleware chain, and run the
//!   lifecycle state machine inside it
//!
//! # Design Decisions
//! - No ambient globals: everything the lifecycle touches is an explicitly
//!   constructed, injected service; the trie is an immutable shared value
//! - Failures convert to responses at this boundary; the transport layer
//!   never sees a raw error

mod lifecycle;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::config::EngineConfig;
use crate::error::DispatchError;
use crate::http::{RequestContext, Response};
use crate::middleware::{ChainCore, CorsMiddleware, Middleware, MiddlewareChain};
use crate::observability::metrics;
use crate::routing::trie::{TrieChild, TrieNode};
use crate::routing::{finalize, flatten, resolve, PathParams, RouteDecl, RouteTrie};
use crate::security::{Authenticator, Throttle, ThrottleStore};
use crate::ws::{ConnectionRegistry, SocketHandler};
use crate::endpoint::Endpoint;

/// The dispatch engine: immutable route table plus shared request services.
pub struct Engine {
    trie: Arc<RouteTrie>,
    middleware: Vec<Arc<dyn Middleware>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    throttles: Arc<ThrottleStore>,
    cache: Arc<ResponseCache>,
    registry: Arc<ConnectionRegistry>,
    config: EngineConfig,
    default_throttle: Option<Throttle>,
    default_cache_ttl: Duration,
    has_socket_routes: bool,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            routes: RouteDecl::Group(Vec::new()),
            middleware: Vec::new(),
            authenticator: None,
        }
    }

    /// Dispatch one request to a response. This is the whole per-request
    /// story: resolution, variable extraction, middleware chain, lifecycle.
    pub async fn dispatch(&self, mut ctx: RequestContext) -> Response {
        let start = std::time::Instant::now();
        let method = ctx.method().as_str().to_string();

        let Some((endpoint, template)) = resolve(&self.trie, ctx.path()) else {
            tracing::debug!(path = %ctx.path(), "No route matched");
            metrics::record_request(&method, 404, "none", start);
            return Response::from(DispatchError::NotFound);
        };

        if endpoint.is_socket() {
            tracing::warn!(path = %ctx.path(), "HTTP request hit a WebSocket route");
            metrics::record_request(&method, 404, &template, start);
            return Response::from(DispatchError::NotFound);
        }

        ctx.set_path_params(PathParams::extract(&template, ctx.path()));

        let chain = MiddlewareChain::compose(&self.middleware, endpoint.middleware());
        let core = LifecycleCore {
            engine: self,
            endpoint: &endpoint,
        };
        let response = chain.run(&mut ctx, &core).await;

        metrics::record_request(&method, response.status(), &template, start);
        tracing::debug!(
            method = %method,
            route = %template,
            status = response.status(),
            "Request dispatched"
        );
        response
    }

    /// Resolve a path to a WebSocket endpoint, if one matches.
    pub fn resolve_socket(
        &self,
        path: &str,
    ) -> Option<(Arc<Endpoint>, Arc<dyn SocketHandler>, String)> {
        let (endpoint, template) = resolve(&self.trie, path)?;
        let handler = endpoint.socket_handler()?;
        Some((endpoint, handler, template))
    }

    /// Run the pre-accept checks (authentication, authorization) for a
    /// WebSocket connection.
    pub async fn authorize_socket(
        &self,
        ctx: &mut RequestContext,
        endpoint: &Endpoint,
    ) -> Result<(), DispatchError> {
        if endpoint.requires_auth() {
            let authenticator = self.authenticator.as_ref().ok_or_else(|| {
                DispatchError::Internal(
                    "endpoint requires auth but no authenticator is configured".to_string(),
                )
            })?;
            let user = authenticator.authenticate(ctx).await?;
            ctx.set_user(user);
        }
        for permission in endpoint.permissions() {
            if !permission.check(ctx).await {
                return Err(DispatchError::Authorization);
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn cache_store(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn throttle_store(&self) -> &Arc<ThrottleStore> {
        &self.throttles
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether any declared route is WebSocket-capable (computed once at
    /// build time).
    pub fn has_socket_routes(&self) -> bool {
        self.has_socket_routes
    }

    fn authenticator(&self) -> Option<&Arc<dyn Authenticator>> {
        self.authenticator.as_ref()
    }

    fn default_throttle(&self) -> Option<Throttle> {
        self.default_throttle
    }

    fn default_cache_ttl(&self) -> Duration {
        self.default_cache_ttl
    }
}

/// Builder wiring routes and services into an engine.
pub struct EngineBuilder {
    config: EngineConfig,
    routes: RouteDecl,
    middleware: Vec<Arc<dyn Middleware>>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl EngineBuilder {
    pub fn routes(mut self, routes: RouteDecl) -> Self {
        self.routes = routes;
        self
    }

    /// Append a global middleware (outermost-first declaration order).
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn build(self) -> Engine {
        let flat = flatten(&self.routes);
        let route_count = flat.len();
        let trie = finalize(flat);
        let has_socket_routes = any_socket(&trie);

        let mut middleware: Vec<Arc<dyn Middleware>> = Vec::new();
        if self.config.cors.enabled {
            middleware.push(Arc::new(CorsMiddleware::new(self.config.cors.clone())));
        }
        middleware.extend(self.middleware);

        let default_throttle = self.config.throttle.enabled.then(|| {
            Throttle::new(
                self.config.throttle.rate,
                Duration::from_secs(self.config.throttle.window_secs),
            )
        });
        let default_cache_ttl = Duration::from_secs(self.config.cache.default_ttl_secs.max(1));

        tracing::info!(
            routes = route_count,
            websocket = has_socket_routes,
            "Route table finalized"
        );

        Engine {
            trie: Arc::new(trie),
            middleware,
            authenticator: self.authenticator,
            throttles: Arc::new(ThrottleStore::new()),
            cache: Arc::new(ResponseCache::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            default_throttle,
            default_cache_ttl,
            has_socket_routes,
            config: self.config,
        }
    }
}

/// Adapter running the lifecycle as the chain's innermost core.
struct LifecycleCore<'e> {
    engine: &'e Engine,
    endpoint: &'e Arc<Endpoint>,
}

#[async_trait::async_trait]
impl ChainCore for LifecycleCore<'_> {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<Response, DispatchError> {
        lifecycle::execute(self.engine, self.endpoint, ctx).await
    }
}

fn any_socket(node: &TrieNode) -> bool {
    node.children().any(|(_, child)| match child {
        TrieChild::Endpoint(endpoint) => endpoint.is_socket(),
        TrieChild::Node(inner) => any_socket(inner),
    })
}
