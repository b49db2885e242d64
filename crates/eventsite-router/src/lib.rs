//! eventsite-router: radix trie path router
//!
//! Shared by the API dispatcher in eventsite-core and by the page
//! route table in [`table`].
//!
//! ## Path Syntax
//! - `:name` - Named parameter (captures one segment)
//! - `*` or `*name` - Wildcard (captures remaining path)
//!
//! ## Priority
//! 1. Exact static match (highest)
//! 2. Parameter match
//! 3. Wildcard match (lowest)
//!
//! ## Example
//! ```
//! use eventsite_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/api/contact-requests", "list").unwrap();
//! router.insert("GET", "/api/contact-requests/:id", "show").unwrap();
//!
//! let m = router.find("GET", "/api/contact-requests/7").unwrap();
//! assert_eq!(*m.value, "show");
//! assert_eq!(m.param("id"), Some("7"));
//! ```

pub mod table;

pub use table::{Resolved, RouteDescriptor, RouteTable, TableError};

use std::collections::HashMap;
use thiserror::Error;

/// Route registration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Path does not start with `/` or has an unnamed parameter
    #[error("invalid route path: {0}")]
    InvalidPath(String),

    /// Another value is already registered for the same method and path shape
    #[error("route conflict: {method} {path}")]
    Conflict { method: String, path: String },
}

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'r, T> {
    /// The matched value
    pub value: &'r T,
    /// Captured path parameters as (name, value) pairs, in path order
    pub params: Vec<(String, String)>,
}

impl<T> Match<'_, T> {
    /// Look up a captured parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get params as HashMap for convenient access
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    param_child: Option<Box<ParamNode>>,
    wildcard_child: Option<WildcardNode>,
    /// Index into `Router::values` if this is a terminal node
    slot: Option<usize>,
}

#[derive(Debug)]
struct ParamNode {
    name: String,
    node: Node,
}

#[derive(Debug)]
struct WildcardNode {
    name: String,
    slot: usize,
}

/// Radix trie router, one tree per HTTP method
#[derive(Debug)]
pub struct Router<T> {
    trees: HashMap<String, Node>,
    values: Vec<T>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            trees: HashMap::new(),
            values: Vec::new(),
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route
    ///
    /// Fails if `path` is not absolute, or if `method` already has a
    /// value for the same path shape (`/a/:x` and `/a/:y` are the same shape).
    pub fn insert(&mut self, method: &str, path: &str, value: T) -> Result<(), RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::InvalidPath(path.to_string()));
        }
        let segs = segments(path);
        if segs.iter().any(|s| *s == ":") {
            return Err(RouteError::InvalidPath(path.to_string()));
        }

        let method = method.to_uppercase();
        let slot = self.values.len();
        let tree = self.trees.entry(method.clone()).or_default();
        if !Self::insert_node(tree, &segs, slot) {
            return Err(RouteError::Conflict {
                method,
                path: path.to_string(),
            });
        }
        self.values.push(value);
        Ok(())
    }

    fn insert_node(node: &mut Node, segs: &[&str], slot: usize) -> bool {
        let Some((&segment, rest)) = segs.split_first() else {
            if node.slot.is_some() {
                return false;
            }
            node.slot = Some(slot);
            return true;
        };

        if let Some(name) = segment.strip_prefix(':') {
            let param = node.param_child.get_or_insert_with(|| {
                Box::new(ParamNode {
                    name: name.to_string(),
                    node: Node::default(),
                })
            });
            if param.name != name {
                return false;
            }
            Self::insert_node(&mut param.node, rest, slot)
        } else if let Some(name) = segment.strip_prefix('*') {
            if node.wildcard_child.is_some() {
                return false;
            }
            let name = if name.is_empty() { "*" } else { name };
            node.wildcard_child = Some(WildcardNode {
                name: name.to_string(),
                slot,
            });
            true
        } else {
            let child = node.children.entry(segment.to_string()).or_default();
            Self::insert_node(child, rest, slot)
        }
    }

    /// Find a matching route
    ///
    /// `HEAD` falls back to the `GET` tree when it has no route of its own.
    pub fn find(&self, method: &str, path: &str) -> Option<Match<'_, T>> {
        let method = method.to_uppercase();
        let segs = segments(path);
        self.find_in(&method, &segs).or_else(|| {
            if method == "HEAD" {
                self.find_in("GET", &segs)
            } else {
                None
            }
        })
    }

    fn find_in(&self, method: &str, segs: &[&str]) -> Option<Match<'_, T>> {
        let tree = self.trees.get(method)?;
        let mut params = Vec::new();
        let slot = Self::find_node(tree, segs, &mut params)?;
        Some(Match {
            value: &self.values[slot],
            params,
        })
    }

    fn find_node(node: &Node, segs: &[&str], params: &mut Vec<(String, String)>) -> Option<usize> {
        let Some((&segment, rest)) = segs.split_first() else {
            return node.slot;
        };

        if let Some(child) = node.children.get(segment) {
            if let Some(slot) = Self::find_node(child, rest, params) {
                return Some(slot);
            }
        }

        if let Some(ref param) = node.param_child {
            params.push((param.name.clone(), segment.to_string()));
            if let Some(slot) = Self::find_node(&param.node, rest, params) {
                return Some(slot);
            }
            params.pop();
        }

        if let Some(ref wildcard) = node.wildcard_child {
            params.push((wildcard.name.clone(), segs.join("/")));
            return Some(wildcard.slot);
        }

        None
    }

    /// Methods that have a route matching `path`, sorted
    ///
    /// `HEAD` is listed wherever `GET` is; `find` answers it from the
    /// `GET` route.
    pub fn allowed_methods(&self, path: &str) -> Vec<String> {
        let segs = segments(path);
        let mut methods: Vec<String> = self
            .trees
            .iter()
            .filter(|(_, tree)| Self::find_node(tree, &segs, &mut Vec::new()).is_some())
            .map(|(m, _)| m.clone())
            .collect();
        if methods.iter().any(|m| m == "GET") && !methods.iter().any(|m| m == "HEAD") {
            methods.push("HEAD".to_string());
        }
        methods.sort();
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes() {
        let mut router = Router::new();
        router.insert("GET", "/", 0).unwrap();
        router.insert("GET", "/api/health", 1).unwrap();
        router.insert("POST", "/api/contact-requests", 2).unwrap();
        router.insert("GET", "/api/contact-requests", 3).unwrap();

        assert_eq!(*router.find("GET", "/").unwrap().value, 0);
        assert_eq!(*router.find("GET", "/api/health").unwrap().value, 1);
        assert_eq!(*router.find("POST", "/api/contact-requests").unwrap().value, 2);
        assert_eq!(*router.find("GET", "/api/contact-requests").unwrap().value, 3);
        assert!(router.find("GET", "/unknown").is_none());
        assert!(router.find("DELETE", "/api/health").is_none());
    }

    #[test]
    fn test_param_routes() {
        let mut router = Router::new();
        router.insert("GET", "/api/contact-requests/:id", 1).unwrap();

        let m = router.find("GET", "/api/contact-requests/42").unwrap();
        assert_eq!(*m.value, 1);
        assert_eq!(m.params, vec![("id".to_string(), "42".to_string())]);
        assert_eq!(m.param("id"), Some("42"));
        assert_eq!(m.params_map().get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn test_named_and_bare_wildcard() {
        let mut router = Router::new();
        router.insert("GET", "/assets/*file", 1).unwrap();
        router.insert("GET", "/static/*", 2).unwrap();

        let m = router.find("GET", "/assets/js/app.js").unwrap();
        assert_eq!(m.param("file"), Some("js/app.js"));

        let m = router.find("GET", "/static/a/b").unwrap();
        assert_eq!(*m.value, 2);
        assert_eq!(m.param("*"), Some("a/b"));
    }

    #[test]
    fn test_priority() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", 1).unwrap();
        router.insert("GET", "/users/me", 2).unwrap();
        router.insert("GET", "/users/*rest", 3).unwrap();

        assert_eq!(*router.find("GET", "/users/me").unwrap().value, 2);
        assert_eq!(*router.find("GET", "/users/123").unwrap().value, 1);
        assert_eq!(*router.find("GET", "/users/123/posts").unwrap().value, 3);
    }

    #[test]
    fn test_conflicts_are_rejected() {
        let mut router = Router::new();
        router.insert("GET", "/events", 1).unwrap();
        assert_eq!(
            router.insert("GET", "/events/", 2),
            Err(RouteError::Conflict {
                method: "GET".to_string(),
                path: "/events/".to_string(),
            })
        );

        router.insert("GET", "/items/:id", 3).unwrap();
        assert!(router.insert("GET", "/items/:slug", 4).is_err());

        // same path under another method is fine
        router.insert("POST", "/events", 5).unwrap();
        assert_eq!(router.find("POST", "/events").map(|m| *m.value), Some(5));
    }

    #[test]
    fn test_invalid_paths() {
        let mut router = Router::new();
        assert!(matches!(router.insert("GET", "events", 1), Err(RouteError::InvalidPath(_))));
        assert!(matches!(router.insert("GET", "/a/:", 1), Err(RouteError::InvalidPath(_))));
        assert!(router.find("GET", "/a").is_none());
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let mut router = Router::new();
        router.insert("get", "/resource", 1).unwrap();

        assert_eq!(*router.find("HEAD", "/resource").unwrap().value, 1);
        assert_eq!(*router.find("Get", "/resource").unwrap().value, 1);
    }

    #[test]
    fn test_allowed_methods() {
        let mut router = Router::new();
        router.insert("GET", "/api/contact-requests", 1).unwrap();
        router.insert("POST", "/api/contact-requests", 2).unwrap();
        router.insert("GET", "/api/profile", 3).unwrap();

        assert_eq!(
            router.allowed_methods("/api/contact-requests"),
            vec!["GET".to_string(), "HEAD".to_string(), "POST".to_string()]
        );
        assert!(router.allowed_methods("/nope").is_empty());
        assert_eq!(router.allowed_methods("/api/profile"), vec!["GET".to_string(), "HEAD".to_string()]);
    }

    #[test]
    fn test_trailing_and_double_slashes() {
        let mut router = Router::new();
        router.insert("GET", "/events", 1).unwrap();

        assert!(router.find("GET", "/events/").is_some());
        assert!(router.find("GET", "//events").is_some());
    }
}
