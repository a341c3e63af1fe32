//! Frontend listener.
//!
//! Accepts client connections and serves each one over HTTP/1.1, routing
//! every request through the director.

mod listener;

pub use listener::FrontendListener;
