//! sgproxy - A session-routing reverse proxy for subgrid simulation backends
//!
//! This crate provides a reverse proxy that routes each HTTP request to the
//! backend currently serving the client's workload:
//! - Session identification via cookie, with an optional per-client fallback cache
//! - Routing metadata resolved through pooled Redis point reads
//! - Per-workload service variants ("model types") on different ports
//! - Fail-closed forwarding: a partially resolved request is never proxied

pub mod config;
pub mod frontend;
pub mod metrics;
pub mod proxy;
pub mod routing;
pub mod session;
pub mod store;
pub mod util;

pub use config::Config;
