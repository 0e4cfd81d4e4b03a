//! Static file serving
//!
//! Resolves request paths against a root directory and turns the outcome into
//! responses: file contents, directory listings, 404s and 405s.

pub mod handler;
pub mod listing;
pub mod resolver;

pub use handler::StaticFileHandler;
pub use resolver::{ResolveError, Resolver, Resource};
