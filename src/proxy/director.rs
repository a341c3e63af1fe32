//! The per-request routing director.
//!
//! One operation: given an inbound request, either produce the backend
//! address it must be forwarded to, or fail closed. Session resolution,
//! metadata lookup and target rewriting run strictly in that order with no
//! branching back.

use crate::routing::{BackendAddr, RouteError, RouteResolver};
use crate::session::{session_cookie, SessionResolver};
use hyper::Request;
use std::net::SocketAddr;
use tracing::{debug, instrument};

/// Resolves the forwarding target for each inbound request.
pub struct Director {
    sessions: SessionResolver,
    routes: RouteResolver,
}

impl Director {
    pub fn new(sessions: SessionResolver, routes: RouteResolver) -> Self {
        Self { sessions, routes }
    }

    /// Resolve the backend address for a request.
    ///
    /// Fails closed: any unresolved step yields an error and the caller must
    /// not forward the request. The store is never contacted when no session
    /// identifier can be established.
    #[instrument(skip_all, fields(client = %client_addr))]
    pub async fn resolve_target<B>(
        &self,
        req: &Request<B>,
        client_addr: SocketAddr,
    ) -> Result<BackendAddr, RouteError> {
        let cookie = session_cookie(req.headers());
        let session = self
            .sessions
            .resolve(cookie.as_deref(), client_addr.ip())
            .ok_or(RouteError::NoSession)?;

        debug!(session = %session, "resolving backend for session");
        self.routes.resolve(&session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VariantPorts;
    use crate::routing::{AddressSource, WorkloadSource};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn request(cookie: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/wms?layers=depth");
        if let Some(value) = cookie {
            builder = builder.header("cookie", value);
        }
        builder.body(()).unwrap()
    }

    fn director(use_cache: bool) -> Director {
        let store = MemoryStore::new();
        store.hset("session_to_subgrid_id", "abc", "subgrid:1");
        store.hset("subgrid_id_to_ip", "subgrid:1", "10.0.0.5");

        let routes = RouteResolver::with_store(
            Arc::new(store),
            WorkloadSource::Lookup,
            AddressSource::Composed {
                ports: VariantPorts::default(),
            },
        );
        Director::new(SessionResolver::new(use_cache), routes)
    }

    fn client() -> SocketAddr {
        "192.168.1.100:54321".parse().unwrap()
    }

    #[tokio::test]
    async fn test_cookie_request_resolves() {
        let director = director(false);

        let addr = director
            .resolve_target(&request(Some("sessionid=abc")), client())
            .await
            .unwrap();
        assert_eq!(addr, BackendAddr::new("10.0.0.5", 5000));
    }

    #[tokio::test]
    async fn test_cookieless_request_uses_cache() {
        let director = director(true);

        // First request seeds the cache for this client address.
        director
            .resolve_target(&request(Some("sessionid=abc")), client())
            .await
            .unwrap();

        let addr = director
            .resolve_target(&request(None), client())
            .await
            .unwrap();
        assert_eq!(addr, BackendAddr::new("10.0.0.5", 5000));
    }

    #[tokio::test]
    async fn test_cookieless_request_without_cache_fails_closed() {
        let director = director(false);

        let err = director
            .resolve_target(&request(None), client())
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::NoSession));
    }

    #[tokio::test]
    async fn test_cache_is_per_client_address() {
        let director = director(true);

        director
            .resolve_target(&request(Some("sessionid=abc")), client())
            .await
            .unwrap();

        let other: SocketAddr = "192.168.1.101:4444".parse().unwrap();
        let err = director
            .resolve_target(&request(None), other)
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::NoSession));
    }
}
