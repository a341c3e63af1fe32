//! HTTP/1.1 forwarding.
//!
//! Applies the director's routing decision to each request: rewrite the
//! target and stream the exchange with the backend, or answer with a generic
//! server error when the request is unroutable. Routing diagnostics stay in
//! the log stream; the client never sees them.

use crate::metrics::MetricsCollector;
use crate::proxy::Director;
use crate::routing::BackendAddr;
use crate::util::RequestId;
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Incoming;
use hyper::http::uri::{Scheme, Uri};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, error, info, instrument, warn};

/// Timeout for establishing the backend connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Context for an HTTP proxy request.
#[derive(Clone)]
pub struct ProxyContext {
    /// Client's address.
    pub client_addr: SocketAddr,
    /// Routing director.
    pub director: Arc<Director>,
    /// Metrics collector.
    pub metrics: MetricsCollector,
    /// Connection-level request ID.
    pub connection_request_id: String,
}

/// Route and proxy a single HTTP request.
#[instrument(skip_all, fields(
    method = %req.method(),
    uri = %req.uri(),
    client = %ctx.client_addr
))]
pub async fn handle_request(
    mut req: Request<Incoming>,
    ctx: ProxyContext,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, Infallible> {
    let start_time = Instant::now();
    let method = req.method().to_string();
    let request_id = request_id_for(&req);

    let target = match ctx.director.resolve_target(&req, ctx.client_addr).await {
        Ok(target) => target,
        Err(e) => {
            warn!(
                connection_id = %ctx.connection_request_id,
                request_id = %request_id,
                reason = e.reason(),
                error = %e,
                "request is unroutable"
            );
            ctx.metrics.record_resolve_failure(e.reason());
            ctx.metrics
                .record_request(&method, 500, start_time.elapsed());
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ));
        }
    };

    rewrite_target(&mut req, &target);
    forward(req, target, ctx, request_id, start_time, method).await
}

/// Forward a request whose target has been resolved.
async fn forward(
    mut req: Request<Incoming>,
    target: BackendAddr,
    ctx: ProxyContext,
    request_id: RequestId,
    start_time: Instant,
    method: String,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, Infallible> {
    let uri = req.uri().to_string();

    debug!(
        connection_id = %ctx.connection_request_id,
        request_id = %request_id,
        backend = %target,
        "proxying HTTP request"
    );

    // Add forwarding headers
    add_request_headers(&mut req, &ctx, &request_id);

    // Connect to backend
    let connect = TcpStream::connect((target.host(), target.port()));
    let backend_stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
        Ok(Ok(stream)) => {
            let _ = stream.set_nodelay(true);
            stream
        }
        Ok(Err(e)) => {
            error!(
                connection_id = %ctx.connection_request_id,
                backend = %target,
                error = %e,
                "failed to connect to backend"
            );
            ctx.metrics
                .record_request(&method, 502, start_time.elapsed());
            return Ok(error_response(StatusCode::BAD_GATEWAY, "Bad Gateway"));
        }
        Err(_) => {
            error!(
                connection_id = %ctx.connection_request_id,
                backend = %target,
                "timed out connecting to backend"
            );
            ctx.metrics
                .record_request(&method, 504, start_time.elapsed());
            return Ok(error_response(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout"));
        }
    };

    let io = TokioIo::new(backend_stream);

    // Create HTTP client connection
    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(result) => result,
        Err(e) => {
            error!(
                connection_id = %ctx.connection_request_id,
                backend = %target,
                error = %e,
                "backend handshake failed"
            );
            ctx.metrics
                .record_request(&method, 502, start_time.elapsed());
            return Ok(error_response(StatusCode::BAD_GATEWAY, "Bad Gateway"));
        }
    };

    // Spawn connection driver
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!(error = %e, "backend connection error");
        }
    });

    // The backend expects a relative URI
    let req_uri = req.uri().clone();
    let path_and_query = req_uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    *req.uri_mut() = path_and_query.parse().unwrap_or_else(|_| Uri::from_static("/"));

    // Send request to backend
    let backend_response = match sender.send_request(req).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(
                connection_id = %ctx.connection_request_id,
                backend = %target,
                error = %e,
                "failed to send request to backend"
            );
            ctx.metrics
                .record_request(&method, 502, start_time.elapsed());
            return Ok(error_response(StatusCode::BAD_GATEWAY, "Bad Gateway"));
        }
    };

    let (parts, body) = backend_response.into_parts();
    let status_code = parts.status.as_u16();
    let response = Response::from_parts(parts, body.boxed());

    let duration = start_time.elapsed();
    ctx.metrics.record_request(&method, status_code, duration);

    info!(
        connection_id = %ctx.connection_request_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
        backend = %target,
        status = status_code,
        duration_ms = duration.as_millis(),
        "proxied request completed"
    );

    Ok(response)
}

/// Point a request at its resolved backend.
///
/// Sets the scheme to `http` and the authority to the backend address,
/// preserving path and query. This is the only mutation routing performs on
/// the request line.
pub fn rewrite_target<B>(req: &mut Request<B>, target: &BackendAddr) {
    let mut parts = req.uri().clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = target.to_string().parse().ok();
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(hyper::http::uri::PathAndQuery::from_static("/"));
    }
    if let Ok(uri) = Uri::from_parts(parts) {
        *req.uri_mut() = uri;
    }
}

/// The id for this exchange: the client's `x-request-id` when it sent a
/// usable one, a fresh UUID otherwise.
fn request_id_for<B>(req: &Request<B>) -> RequestId {
    req.headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(RequestId::from_string)
        .unwrap_or_default()
}

/// Add headers to the request being sent to the backend.
fn add_request_headers<B>(req: &mut Request<B>, ctx: &ProxyContext, request_id: &RequestId) {
    let headers = req.headers_mut();

    // Add X-Forwarded-For
    if let Ok(value) = ctx.client_addr.ip().to_string().parse() {
        headers.insert("x-forwarded-for", value);
    }

    // Add X-Real-IP
    if let Ok(value) = ctx.client_addr.ip().to_string().parse() {
        headers.insert("x-real-ip", value);
    }

    // Add X-Request-Id for backend-side correlation
    if let Ok(value) = request_id.as_str().parse() {
        headers.insert("x-request-id", value);
    }
}

/// Create an error response with a plain, routing-free body.
fn error_response(status: StatusCode, message: &str) -> Response<BoxBody<Bytes, hyper::Error>> {
    let body = Full::new(Bytes::from(format!("{}\n", message)))
        .map_err(|never| match never {})
        .boxed();

    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(body)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_target_sets_scheme_and_authority() {
        let mut req = Request::builder()
            .uri("/wms?layers=depth&bbox=1,2,3,4")
            .body(())
            .unwrap();

        rewrite_target(&mut req, &BackendAddr::new("10.0.0.5", 5000));

        assert_eq!(req.uri().scheme_str(), Some("http"));
        assert_eq!(req.uri().authority().unwrap().as_str(), "10.0.0.5:5000");
        assert_eq!(req.uri().path(), "/wms");
        assert_eq!(req.uri().query(), Some("layers=depth&bbox=1,2,3,4"));
    }

    #[test]
    fn test_rewrite_target_defaults_path() {
        let mut req = Request::builder().uri("http://old-host/").body(()).unwrap();
        rewrite_target(&mut req, &BackendAddr::new("10.0.0.5", 5010));

        assert_eq!(req.uri().authority().unwrap().as_str(), "10.0.0.5:5010");
        assert_eq!(req.uri().path(), "/");
    }

    #[test]
    fn test_error_response_is_generic() {
        let resp = error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_request_id_reuses_incoming_header() {
        let req = Request::builder()
            .uri("/wms")
            .header("x-request-id", "upstream-7")
            .body(())
            .unwrap();

        assert_eq!(request_id_for(&req).as_str(), "upstream-7");
    }

    #[test]
    fn test_request_id_minted_when_absent_or_empty() {
        let req = Request::builder().uri("/wms").body(()).unwrap();
        assert_eq!(request_id_for(&req).as_str().len(), 36);

        let req = Request::builder()
            .uri("/wms")
            .header("x-request-id", "")
            .body(())
            .unwrap();
        assert_eq!(request_id_for(&req).as_str().len(), 36);
    }

    #[test]
    fn test_add_request_headers() {
        use crate::config::VariantPorts;
        use crate::proxy::Director;
        use crate::routing::RouteResolver;
        use crate::session::SessionResolver;
        use crate::metrics::MetricsCollector;

        let ctx = ProxyContext {
            client_addr: "192.168.1.9:4444".parse().unwrap(),
            director: Arc::new(Director::new(
                SessionResolver::new(false),
                RouteResolver::local("subgrid:10000", VariantPorts::default()),
            )),
            metrics: MetricsCollector::new(),
            connection_request_id: "req-0000000000000001".to_string(),
        };

        let mut req = Request::builder().uri("/wms").body(()).unwrap();
        add_request_headers(&mut req, &ctx, &RequestId::from_string("upstream-7"));

        assert_eq!(req.headers()["x-forwarded-for"], "192.168.1.9");
        assert_eq!(req.headers()["x-real-ip"], "192.168.1.9");
        assert_eq!(req.headers()["x-request-id"], "upstream-7");
    }
}
