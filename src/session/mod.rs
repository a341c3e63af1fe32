//! Session identification.
//!
//! Every request is tied to a session through the `sessionid` cookie. For
//! clients that drop the cookie mid-session (development browsers, WMS tile
//! viewers), an optional fallback cache remembers the last identifier seen
//! per client address.

mod cache;
mod resolver;

pub use cache::SessionCache;
pub use resolver::{session_cookie, SessionResolver, SESSION_COOKIE};
