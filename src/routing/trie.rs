//! Finalized route trie.
//!
//! # Responsibilities
//! - Convert the flat route table into a segment-keyed tree
//! - Deep-merge per-path spines so `/` and nested groups coexist
//! - Settle parameter-sibling conflicts at build time
//!
//! # Design Decisions
//! - Built once at startup, O(total segment count); immutable afterwards so
//!   it is shared across request tasks without locks
//! - Children are kept in registration order in a small vector; route tables
//!   are shallow and narrow enough that a linear probe beats hashing

use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::routing::table::{FlatRoutes, FlatTarget};

/// The empty-segment key marking "this exact path, no further segments".
/// It lets a path and its children coexist (`user/` next to `user/<id>/`).
pub const EXACT: &str = "";

/// A trie node: children keyed by the next path segment.
#[derive(Default)]
pub struct TrieNode {
    children: Vec<(String, TrieChild)>,
}

/// A child is either a terminal endpoint or a subtree.
pub enum TrieChild {
    Endpoint(Arc<Endpoint>),
    Node(TrieNode),
}

/// Root of the finalized trie.
pub type RouteTrie = TrieNode;

impl TrieNode {
    pub fn get(&self, segment: &str) -> Option<&TrieChild> {
        self.children
            .iter()
            .find(|(key, _)| key == segment)
            .map(|(_, child)| child)
    }

    /// Children in registration order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &TrieChild)> {
        self.children.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn insert(&mut self, key: String, child: TrieChild) {
        match self.children.iter().position(|(k, _)| *k == key) {
            Some(i) => self.children[i].1 = child,
            None => self.children.push((key, child)),
        }
    }

    /// Endpoint terminating exactly here, if any.
    pub fn exact_endpoint(&self) -> Option<&Arc<Endpoint>> {
        match self.get(EXACT) {
            Some(TrieChild::Endpoint(endpoint)) => Some(endpoint),
            _ => None,
        }
    }
}

/// Finalize the flat route table into the live lookup trie.
pub fn finalize(flat: FlatRoutes) -> RouteTrie {
    let mut root = TrieNode::default();
    for (path, target) in flat {
        let spine = build_spine(&path, target);
        merge(&mut root, spine);
    }
    simplify(&mut root);
    reject_parameter_siblings(&mut root, "");
    root
}

/// Build one path's spine bottom-up: wrap the target in a single-key node
/// per segment, innermost first.
fn build_spine(path: &str, target: FlatTarget) -> TrieNode {
    let child = match target {
        FlatTarget::Endpoint(endpoint) => TrieChild::Endpoint(endpoint),
        FlatTarget::Reserved => TrieChild::Node(TrieNode::default()),
    };

    // "user/list/" → ["user", "list"]; the root path "/" → [""].
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        segments.push(EXACT);
    }

    let mut wrapped = child;
    for (depth, segment) in segments.iter().rev().enumerate() {
        // Terminal endpoints sit under the exact-path key so siblings can
        // merge in beside them later.
        if depth == 0 && !segment.is_empty() && matches!(wrapped, TrieChild::Endpoint(_)) {
            let mut exact = TrieNode::default();
            exact.insert(EXACT.to_string(), wrapped);
            wrapped = TrieChild::Node(exact);
        }
        let mut parent = TrieNode::default();
        parent.insert((*segment).to_string(), wrapped);
        wrapped = TrieChild::Node(parent);
    }
    match wrapped {
        TrieChild::Node(node) => node,
        TrieChild::Endpoint(_) => unreachable!("spine always ends in a node"),
    }
}

/// Deep-merge `src` into `dst`: recursive where both sides are subtrees,
/// last write wins otherwise.
fn merge(dst: &mut TrieNode, src: TrieNode) {
    for (key, src_child) in src.children {
        match dst.children.iter().position(|(k, _)| *k == key) {
            Some(i) => match (&mut dst.children[i].1, src_child) {
                (TrieChild::Node(dst_node), TrieChild::Node(src_node)) => {
                    merge(dst_node, src_node);
                }
                (slot, src_child) => *slot = src_child,
            },
            None => dst.children.push((key, src_child)),
        }
    }
}

/// Collapse nodes whose only content is an exact-path endpoint back into a
/// plain terminal child.
fn simplify(node: &mut TrieNode) {
    for (_, child) in node.children.iter_mut() {
        if let TrieChild::Node(inner) = child {
            simplify(inner);
            let lone_exact = match inner.children.as_slice() {
                [(key, TrieChild::Endpoint(endpoint))] if key.is_empty() => Some(endpoint.clone()),
                _ => None,
            };
            if let Some(endpoint) = lone_exact {
                *child = TrieChild::Endpoint(endpoint);
            }
        }
    }
}

/// Two parameter-token siblings of the same shape (both subtrees, or both
/// terminals) would make resolution registration-order dependent. The first
/// registration wins; later ones are logged and dropped.
fn reject_parameter_siblings(node: &mut TrieNode, path: &str) {
    let mut seen_node = false;
    let mut seen_terminal = false;
    let mut kept = Vec::with_capacity(node.children.len());
    for (key, child) in node.children.drain(..) {
        let is_param = key.starts_with('<');
        let drop = if is_param {
            match &child {
                TrieChild::Node(_) => std::mem::replace(&mut seen_node, true),
                TrieChild::Endpoint(_) => std::mem::replace(&mut seen_terminal, true),
            }
        } else {
            false
        };
        if drop {
            tracing::error!(
                path = %format!("{path}/{key}"),
                "Conflicting parameter segment at the same level was skipped"
            );
        } else {
            kept.push((key, child));
        }
    }
    node.children = kept;
    for (key, child) in node.children.iter_mut() {
        if let TrieChild::Node(inner) = child {
            reject_parameter_siblings(inner, &format!("{path}/{key}"));
        }
    }
}
