//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, layers, body collection)
//!     → request.rs (per-request context)
//!     → [dispatch engine resolves and runs the lifecycle]
//!     → response.rs (normalized response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{BodyData, Identity, RequestContext};
pub use response::Response;
pub use server::Server;
