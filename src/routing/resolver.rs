//! Per-request path resolution and variable extraction.
//!
//! # Responsibilities
//! - Walk the trie for a request path, literal segments before parameters
//! - Return the matched endpoint plus the declaration template it matched
//! - Zip the template against the literal path to recover variable values
//!
//! # Design Decisions
//! - Longest-prefix walk, O(depth); no backtracking
//! - A literal match always beats a parameter match at the same level
//! - Typed accessors surface coercion failures as client errors naming the
//!   offending value and target type

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::error::DispatchError;
use crate::routing::trie::{TrieChild, TrieNode};

/// Resolve a request path against the trie.
///
/// Returns the endpoint and the matched declaration template (parameter
/// tokens intact, e.g. `user/<id>/`) so the caller can extract variables.
pub fn resolve(root: &TrieNode, path: &str) -> Option<(Arc<Endpoint>, String)> {
    let bare = path.split('?').next().unwrap_or("");
    let parts: Vec<&str> = bare.trim_matches('/').split('/').collect();
    let count = parts.len();

    let mut node = root;
    let mut matched: Vec<&str> = Vec::with_capacity(count);

    for (i, part) in parts.iter().enumerate() {
        let last = i + 1 == count;

        if last {
            match node.get(part) {
                Some(TrieChild::Endpoint(endpoint)) => {
                    matched.push(part);
                    return Some((endpoint.clone(), template(&matched)));
                }
                Some(TrieChild::Node(inner)) => {
                    // The literal matched a subtree; it terminates only if
                    // an exact-path endpoint sits inside.
                    let endpoint = inner.exact_endpoint()?;
                    matched.push(part);
                    return Some((endpoint.clone(), template(&matched)));
                }
                None => {
                    // No literal: the first terminal-capable parameter
                    // sibling takes the segment.
                    for (key, child) in node.children() {
                        if !key.starts_with('<') {
                            continue;
                        }
                        match child {
                            TrieChild::Endpoint(endpoint) => {
                                matched.push(key);
                                return Some((endpoint.clone(), template(&matched)));
                            }
                            TrieChild::Node(inner) => {
                                if let Some(endpoint) = inner.exact_endpoint() {
                                    matched.push(key);
                                    return Some((endpoint.clone(), template(&matched)));
                                }
                            }
                        }
                    }
                    return None;
                }
            }
        }

        match node.get(part) {
            Some(TrieChild::Node(inner)) => {
                matched.push(part);
                node = inner;
            }
            // A terminal where more segments remain cannot match.
            Some(TrieChild::Endpoint(_)) => return None,
            None => {
                let param = node
                    .children()
                    .find(|(key, child)| key.starts_with('<') && matches!(child, TrieChild::Node(_)));
                match param {
                    Some((key, TrieChild::Node(inner))) => {
                        matched.push(key);
                        node = inner;
                    }
                    _ => return None,
                }
            }
        }
    }
    None
}

fn template(matched: &[&str]) -> String {
    let mut joined = matched.join("/");
    joined.push('/');
    joined
}

/// Variables extracted from parameterized path segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    /// Zip the matched template against the literal request path, binding
    /// every `<name>` token to the raw segment value.
    pub fn extract(matched_template: &str, request_path: &str) -> Self {
        let bare = request_path.split('?').next().unwrap_or("");
        let mut params = BTreeMap::new();
        for (token, value) in matched_template
            .trim_matches('/')
            .split('/')
            .zip(bare.trim_matches('/').split('/'))
        {
            if let Some(name) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                params.insert(name.to_string(), value.to_string());
            }
        }
        Self(params)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse a variable into a target type; failure is a client error naming
    /// the value and the type it should have been.
    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Result<T, DispatchError> {
        let raw = self
            .get(name)
            .ok_or_else(|| DispatchError::invalid_path_variable("<missing>", std::any::type_name::<T>()))?;
        raw.parse::<T>()
            .map_err(|_| DispatchError::invalid_path_variable(raw, std::any::type_name::<T>()))
    }

    /// Boolean coercion: `"false"` and `"0"` are false, anything else true.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)
            .map(|raw| !matches!(raw.to_ascii_lowercase().as_str(), "false" | "0"))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
