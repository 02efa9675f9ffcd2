//! Wayfarer: routing and request-dispatch core for asynchronous
//! HTTP/WebSocket services.
//!
//! # Architecture Overview
//!
//! ```text
//!   Request ──▶ http::server (axum transport adapter)
//!                   │
//!                   ▼
//!              routing (flatten → finalize → resolve, literal before
//!              parameter, variables zipped from the matched template)
//!                   │
//!                   ▼
//!              dispatch::Engine ── middleware chain wraps the lifecycle:
//!              preflight → method → auth → permissions → throttle →
//!              validation → cache → handler → normalize → cache
//!                   │
//!                   ▼
//!              http::Response ──▶ client
//!
//!   WebSocket upgrades resolve through the same trie and hand off to
//!   ws::ConnectionRegistry (register → listen loop → deregister).
//! ```
//!
//! The route table is built once at startup and shared immutably; cache,
//! throttle counters, and the connection registry are the only shared
//! mutable state, each behind a concurrent map.

// Core subsystems
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod routing;

// Request services
pub mod cache;
pub mod middleware;
pub mod security;
pub mod validation;
pub mod ws;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::EngineConfig;
pub use dispatch::Engine;
pub use endpoint::{handler_fn, Endpoint, Handler, MethodTable, Reply};
pub use error::DispatchError;
pub use http::{RequestContext, Response, Server};
pub use lifecycle::Shutdown;
pub use routing::RouteDecl;
