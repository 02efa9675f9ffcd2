//! Route table construction.
//!
//! # Responsibilities
//! - Flatten a nested route declaration into normalized path → endpoint pairs
//! - Normalize paths (no leading slash, one trailing slash, no duplicates)
//! - Reject unset leaves and invalid characters without aborting the build
//!
//! # Design Decisions
//! - Rejections are logged and skipped; sibling routes stay intact
//! - Declaration order is preserved (it drives downstream tie-breaking)
//! - Character validation is a plain scan, no regex

use std::sync::Arc;

use crate::endpoint::Endpoint;

/// A user-declared route tree.
///
/// Leaves are endpoints; groups nest path prefixes. `Reserved` pins a path
/// with no handler so it cannot be swallowed by a parameter segment, and
/// `Unset` is the declaration-time placeholder that the builder rejects.
pub enum RouteDecl {
    Endpoint(Arc<Endpoint>),
    Group(Vec<(String, RouteDecl)>),
    Reserved,
    Unset,
}

impl RouteDecl {
    /// Build a group from `(path fragment, declaration)` pairs.
    pub fn group<K>(entries: impl IntoIterator<Item = (K, RouteDecl)>) -> Self
    where
        K: Into<String>,
    {
        RouteDecl::Group(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn endpoint(endpoint: Arc<Endpoint>) -> Self {
        RouteDecl::Endpoint(endpoint)
    }
}

/// A flattened route: either a live endpoint or a reserved path.
#[derive(Clone)]
pub enum FlatTarget {
    Endpoint(Arc<Endpoint>),
    Reserved,
}

/// Normalized path → target, in declaration order.
pub type FlatRoutes = Vec<(String, FlatTarget)>;

/// Flatten a nested declaration into a flat route table.
///
/// Invalid entries (unset leaves, paths with characters outside
/// `[A-Za-z0-9_<>/-]`) are logged and skipped; the rest of the build
/// continues.
pub fn flatten(declared: &RouteDecl) -> FlatRoutes {
    let mut flat = FlatRoutes::new();
    walk(declared, "", &mut flat);
    flat
}

fn walk(decl: &RouteDecl, prefix: &str, flat: &mut FlatRoutes) {
    match decl {
        RouteDecl::Group(entries) => {
            if entries.is_empty() {
                push(flat, prefix, FlatTarget::Reserved);
                return;
            }
            for (fragment, child) in entries {
                let joined = format!("{prefix}/{fragment}");
                walk(child, &joined, flat);
            }
        }
        RouteDecl::Endpoint(endpoint) => {
            push(flat, prefix, FlatTarget::Endpoint(endpoint.clone()));
        }
        RouteDecl::Reserved => {
            push(flat, prefix, FlatTarget::Reserved);
        }
        RouteDecl::Unset => {
            tracing::error!(path = %normalize(prefix), "Route points to nothing and was skipped");
        }
    }
}

fn push(flat: &mut FlatRoutes, raw: &str, target: FlatTarget) {
    let path = normalize(raw);
    if !is_valid(&path) {
        tracing::error!(path = %path, "Route path contains invalid characters and was skipped");
        return;
    }
    // Last declaration of a duplicate path wins, keeping its original slot.
    match flat.iter().position(|(existing, _)| *existing == path) {
        Some(i) => flat[i].1 = target,
        None => flat.push((path, target)),
    }
}

/// Collapse duplicate slashes and guarantee exactly one trailing slash.
/// The root path normalizes to `"/"`.
fn normalize(raw: &str) -> String {
    let mut path: String = raw
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    path.push('/');
    path
}

fn is_valid(path: &str) -> bool {
    path.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '<' | '>' | '/' | '-'))
}
