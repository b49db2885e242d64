//! eventsite-server: backend of the event site
//!
//! Serves the built frontend with history fallback for the page routes,
//! accepts contact form submissions (stored in SQLite, announced by
//! mail) and gives site editors an Auth0 backed login to read them.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod controllers;
pub mod identity;
pub mod mail;
pub mod notify;
pub mod pages;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use pages::{page_routes, View};
pub use routes::build_app;
pub use state::AppState;
pub use store::{ContactRequest, ContactStore, SqliteStore};
