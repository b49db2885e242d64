//! Page route table
//!
//! An immutable mapping from URL paths to named views, built once at
//! startup. Paths and names are both unique; a path that differs only
//! by trailing or doubled slashes counts as the same path.

use crate::{RouteError, Router};
use thiserror::Error;

/// Page routes are looked up independently of the HTTP method.
const PAGE_TREE: &str = "PAGE";

/// Errors raised while building a [`RouteTable`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("route path must start with '/': {0:?}")]
    InvalidPath(String),

    #[error("route at {path:?} has an empty name")]
    EmptyName { path: String },

    #[error("duplicate route path: {0}")]
    DuplicatePath(String),

    #[error("duplicate route name: {0}")]
    DuplicateName(String),
}

/// A mapping from a URL path to a named view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor<V> {
    path: String,
    name: String,
    view: V,
}

impl<V> RouteDescriptor<V> {
    pub fn new(path: impl Into<String>, name: impl Into<String>, view: V) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            view,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}

/// Result of resolving a path against the table
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'t, V> {
    pub route: &'t RouteDescriptor<V>,
    /// Parameters captured by `:name` / `*name` segments
    pub params: Vec<(String, String)>,
}

/// Immutable page route table
#[derive(Debug)]
pub struct RouteTable<V> {
    routes: Vec<RouteDescriptor<V>>,
    paths: Router<usize>,
}

impl<V> RouteTable<V> {
    /// Build the table, validating every descriptor
    ///
    /// ```
    /// use eventsite_router::{RouteDescriptor, RouteTable};
    ///
    /// let table = RouteTable::build([
    ///     RouteDescriptor::new("/", "Home", 'h'),
    ///     RouteDescriptor::new("/events", "Events", 'e'),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!(table.resolve("/events").unwrap().route.name(), "Events");
    /// assert!(table.resolve("/missing").is_none());
    /// ```
    pub fn build(routes: impl IntoIterator<Item = RouteDescriptor<V>>) -> Result<Self, TableError> {
        let mut table = Self {
            routes: Vec::new(),
            paths: Router::new(),
        };

        for route in routes {
            if route.name.trim().is_empty() {
                return Err(TableError::EmptyName { path: route.path });
            }
            if table.by_name(&route.name).is_some() {
                return Err(TableError::DuplicateName(route.name));
            }
            match table.paths.insert(PAGE_TREE, &route.path, table.routes.len()) {
                Ok(()) => {}
                Err(RouteError::InvalidPath(path)) => return Err(TableError::InvalidPath(path)),
                Err(RouteError::Conflict { path, .. }) => return Err(TableError::DuplicatePath(path)),
            }
            table.routes.push(route);
        }

        Ok(table)
    }

    /// Resolve a request path (without query string) to its route
    pub fn resolve(&self, path: &str) -> Option<Resolved<'_, V>> {
        let matched = self.paths.find(PAGE_TREE, path)?;
        Some(Resolved {
            route: &self.routes[*matched.value],
            params: matched.params,
        })
    }

    pub fn by_name(&self, name: &str) -> Option<&RouteDescriptor<V>> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Routes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &RouteDescriptor<V>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
