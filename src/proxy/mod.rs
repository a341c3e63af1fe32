//! Request routing and HTTP forwarding.

mod director;
mod http_proxy;

pub use director::Director;
pub use http_proxy::{handle_request, rewrite_target, ProxyContext};
