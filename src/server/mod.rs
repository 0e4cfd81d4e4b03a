//! TCP transport: binding the listening socket and the accept loop.

pub mod listener;

pub use listener::Listener;
