//! Route declaration, table construction, and path resolution.
//!
//! # Data Flow
//! ```text
//! RouteDecl (nested, user-declared)
//!     → table.rs   flatten: normalized flat path → endpoint
//!     → trie.rs    finalize: segment-keyed tree, built once at startup
//!     → resolver.rs resolve: per-request walk, literal before parameter
//! ```
//!
//! # Design Decisions
//! - The finalized trie is immutable and shared via `Arc` (no locks on the
//!   request path)
//! - Children keep registration order; ties between parameter siblings are
//!   settled at build time, not at resolution time

pub mod resolver;
pub mod table;
pub mod trie;

pub use resolver::{resolve, PathParams};
pub use table::{flatten, FlatRoutes, FlatTarget, RouteDecl};
pub use trie::{finalize, RouteTrie, TrieChild, TrieNode};
