//! Lantern - Static File Server
//!
//! Core library for serving files and directory listings over HTTP/1.1.

pub mod config;
pub mod http;
pub mod server;
pub mod static_files;
