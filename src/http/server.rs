//! HTTP server setup and dispatch entry point.
//!
//! # Responsibilities
//! - Create the axum router: one catch-all route into the engine
//! - Wire up middleware layers (timeout, request ID, tracing)
//! - Detect WebSocket upgrades on socket routes and hand them to the
//!   registry
//! - Collect request bodies and build the per-request context
//!
//! # Design Decisions
//! - The transport is consumed, not owned: axum/hyper drive the engine, the
//!   engine never touches sockets
//! - Dispatch runs in its own spawned task, so middleware `after` hooks
//!   complete even when the client disconnects mid-request

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::{HeaderMap, Request},
    response::IntoResponse,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::dispatch::Engine;
use crate::error::{DispatchError, FieldErrors};
use crate::http::{RequestContext, Response};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::PathParams;

/// HTTP/WebSocket server driving a dispatch engine.
pub struct Server {
    engine: Arc<Engine>,
}

impl Server {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(&self) -> Router {
        let request_timeout = Duration::from_secs(self.engine.config().timeouts.request_secs);
        Router::new()
            .route("/{*path}", any(entry))
            .route("/", any(entry))
            .with_state(self.engine.clone())
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let observability = &self.engine.config().observability;
        if observability.metrics_enabled {
            match observability.metrics_address.parse() {
                Ok(metrics_addr) => metrics::init_metrics(metrics_addr),
                Err(_) => tracing::error!(
                    metrics_address = %observability.metrics_address,
                    "Failed to parse metrics address"
                ),
            }
        }

        let shutdown = Shutdown::new();
        shutdown.on_ctrl_c();
        let mut stop = shutdown.subscribe();

        let engine = self.engine.clone();
        let app = self
            .build_router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        engine.registry().close_all(1001, "server shutting down").await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Single entry point for every request: WebSocket upgrades peel off to the
/// registry, everything else goes through the dispatch lifecycle.
async fn entry(
    State(engine): State<Arc<Engine>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> axum::response::Response {
    let (mut parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().unwrap_or("").to_string();
    let method = parts.method.clone();
    let headers = parts.headers.clone();

    if engine.has_socket_routes() && wants_upgrade(&headers) {
        if let Some((endpoint, handler, template)) = engine.resolve_socket(&path) {
            let mut ctx = RequestContext::new(
                method,
                path.clone(),
                headers,
                query,
                axum::body::Bytes::new(),
                Some(addr),
            );
            let params = PathParams::extract(&template, &path);
            ctx.set_path_params(params.clone());

            // Authentication and permissions run before the upgrade; a
            // rejected connection never reaches the registry.
            if let Err(err) = engine.authorize_socket(&mut ctx, &endpoint).await {
                tracing::debug!(path = %path, error = %err, "WebSocket connection rejected");
                return Response::from(err).into();
            }
            let user = ctx.user().cloned();

            use axum::RequestPartsExt;
            return match parts.extract::<WebSocketUpgrade>().await {
                Ok(upgrade) => upgrade.on_upgrade(move |socket| async move {
                    let registry = engine.registry().clone();
                    registry.serve(socket, handler, path, params, user).await;
                }),
                Err(rejection) => rejection.into_response(),
            };
        }
    }

    // Concatenate body chunks until end-of-body, bounded by the configured
    // limit.
    let limit = engine.config().listener.max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(error = %err, "Failed to read request body");
            let mut fields = FieldErrors::new();
            fields.insert(
                "body".to_string(),
                "request body too large or unreadable".to_string(),
            );
            return Response::from(DispatchError::BadRequest(fields)).into();
        }
    };

    let ctx = RequestContext::new(method, path, headers, query, body, Some(addr));

    // Dispatch in its own task: if the client goes away and this future is
    // dropped, entered middleware still unwinds in order.
    let dispatcher = engine.clone();
    match tokio::spawn(async move { dispatcher.dispatch(ctx).await }).await {
        Ok(response) => response.into(),
        Err(err) => {
            tracing::error!(error = %err, "Dispatch task failed");
            Response::from(DispatchError::Internal(err.to_string())).into()
        }
    }
}

fn wants_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}
