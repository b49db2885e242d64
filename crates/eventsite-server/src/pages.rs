//! Client-side page routes
//!
//! The frontend renders these views itself; the server only needs the
//! table to know which deep links get the application shell.

use eventsite_router::{RouteDescriptor, RouteTable, TableError};

/// Views of the frontend bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Events,
}

/// The site's page routes, in navigation order
pub fn page_routes() -> Result<RouteTable<View>, TableError> {
    RouteTable::build([
        RouteDescriptor::new("/", "Home", View::Home),
        RouteDescriptor::new("/events", "Events", View::Events),
    ])
}
