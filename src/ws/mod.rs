//! WebSocket connections.
//!
//! # Data Flow
//! ```text
//! HTTP upgrade on a socket route
//!     → registry.rs serve: register, writer task, listen loop
//!     → socket.rs   handler callbacks with a sendable handle
//!     → disconnect  → deregister
//! ```
//!
//! # Design Decisions
//! - Resolution reuses the same route trie as HTTP dispatch
//! - The registry owns only channel ends; each connection's transport stays
//!   with its own task

pub mod registry;
pub mod socket;

pub use registry::ConnectionRegistry;
pub use socket::{Frame, Outbound, Socket, SocketError, SocketHandler};
