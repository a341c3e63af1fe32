//! Session identifier resolution.

use crate::session::SessionCache;
use hyper::header::COOKIE;
use hyper::HeaderMap;
use std::net::IpAddr;
use tracing::debug;

/// Name of the cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "sessionid";

/// Resolves a session identifier from a request's cookie, falling back to
/// the per-client cache when enabled.
pub struct SessionResolver {
    cache: Option<SessionCache>,
}

impl SessionResolver {
    /// Create a resolver; `use_cache` enables the fallback cache.
    pub fn new(use_cache: bool) -> Self {
        Self {
            cache: use_cache.then(SessionCache::new),
        }
    }

    /// Resolve the session identifier for a request.
    ///
    /// A cookie value wins and, with caching enabled, is remembered for the
    /// client address. Without a cookie the cache is consulted. `None` means
    /// the request cannot be tied to a session; the caller fails closed.
    pub fn resolve(&self, cookie: Option<&str>, client: IpAddr) -> Option<String> {
        if let Some(session_id) = cookie {
            debug!(session = session_id, "got session key from request");
            if let Some(cache) = &self.cache {
                debug!(client = %client, "storing session key in cache");
                cache.insert(client, session_id);
            }
            return Some(session_id.to_string());
        }

        let cache = self.cache.as_ref()?;
        let cached = cache.get(&client);
        match &cached {
            Some(session_id) => debug!(client = %client, session = session_id, "got session key from cache"),
            None => debug!(client = %client, "no session key in cache"),
        }
        cached
    }

    /// The fallback cache, if enabled.
    pub fn cache(&self) -> Option<&SessionCache> {
        self.cache.as_ref()
    }
}

/// Extract the session cookie value from a request's headers.
///
/// Handles multiple `Cookie` headers and multiple pairs per header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                if name.trim() == SESSION_COOKIE {
                    return Some(value.trim().to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn client(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_cookie_wins_and_populates_cache() {
        let resolver = SessionResolver::new(true);
        let addr = client("192.168.1.100");

        let resolved = resolver.resolve(Some("abc"), addr);
        assert_eq!(resolved, Some("abc".to_string()));

        // Subsequent cookieless request uses the cache
        let resolved = resolver.resolve(None, addr);
        assert_eq!(resolved, Some("abc".to_string()));
    }

    #[test]
    fn test_cookie_overwrites_cache_entry() {
        let resolver = SessionResolver::new(true);
        let addr = client("192.168.1.100");

        resolver.resolve(Some("old"), addr);
        resolver.resolve(Some("new"), addr);

        assert_eq!(resolver.resolve(None, addr), Some("new".to_string()));
    }

    #[test]
    fn test_no_cookie_no_cache_entry_fails() {
        let resolver = SessionResolver::new(true);
        assert_eq!(resolver.resolve(None, client("10.0.0.1")), None);
    }

    #[test]
    fn test_cache_disabled() {
        let resolver = SessionResolver::new(false);
        let addr = client("192.168.1.100");

        // Cookie still resolves, but nothing is cached
        assert_eq!(resolver.resolve(Some("abc"), addr), Some("abc".to_string()));
        assert_eq!(resolver.resolve(None, addr), None);
        assert!(resolver.cache().is_none());
    }

    #[test]
    fn test_cache_disabled_does_not_leak_between_clients() {
        let resolver = SessionResolver::new(true);

        resolver.resolve(Some("abc"), client("10.0.0.1"));
        assert_eq!(resolver.resolve(None, client("10.0.0.2")), None);
    }

    #[test]
    fn test_session_cookie_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sessionid=abc"));
        assert_eq!(session_cookie(&headers), Some("abc".to_string()));
    }

    #[test]
    fn test_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("csrftoken=xyz; sessionid=abc; theme=dark"),
        );
        assert_eq!(session_cookie(&headers), Some("abc".to_string()));
    }

    #[test]
    fn test_session_cookie_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("csrftoken=xyz"));
        headers.append(COOKIE, HeaderValue::from_static("sessionid=abc"));
        assert_eq!(session_cookie(&headers), Some("abc".to_string()));
    }

    #[test]
    fn test_session_cookie_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("csrftoken=xyz"));
        assert_eq!(session_cookie(&headers), None);

        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_name_is_exact() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("xsessionid=abc"));
        assert_eq!(session_cookie(&headers), None);
    }
}
