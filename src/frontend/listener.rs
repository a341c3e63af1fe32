//! Frontend listener implementation.

use crate::metrics::MetricsCollector;
use crate::proxy::{handle_request, Director, ProxyContext};
use crate::util::RequestId;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Frontend listener that accepts and handles connections.
pub struct FrontendListener {
    /// Routing director shared by all connections.
    director: Arc<Director>,
    /// TCP listener.
    listener: TcpListener,
    /// Metrics collector.
    metrics: MetricsCollector,
}

impl FrontendListener {
    /// Create a new frontend listener.
    pub async fn bind(
        listen: SocketAddr,
        director: Arc<Director>,
        metrics: MetricsCollector,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(listen).await?;

        info!(listen = %listener.local_addr()?, "frontend listener bound");

        Ok(Self {
            director,
            listener,
            metrics,
        })
    }

    /// The bound address; useful when listening on port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener, accepting connections until shutdown.
    #[instrument(skip_all)]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("frontend listener starting");

        loop {
            tokio::select! {
                // Accept new connections
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                // Handle shutdown signal
                _ = shutdown.recv() => {
                    info!("frontend listener shutting down");
                    break;
                }
            }
        }
    }

    /// Handle an incoming connection.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        // Set TCP_NODELAY on client connection
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let director = Arc::clone(&self.director);
        let metrics = self.metrics.clone();
        let request_id = RequestId::short();

        // Track connection opened
        metrics.connection_opened();

        // Spawn a task to handle this connection
        tokio::spawn(async move {
            let start_time = Instant::now();

            let ctx = ProxyContext {
                client_addr,
                director,
                metrics: metrics.clone(),
                connection_request_id: request_id.as_str().to_string(),
            };

            let io = TokioIo::new(stream);

            let service = service_fn(move |req| {
                let ctx = ctx.clone();
                async move { handle_request(req, ctx).await }
            });

            // Serve HTTP/1.1 with keep-alive support
            let result = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await;

            // Track connection closed
            metrics.connection_closed();

            let duration = start_time.elapsed();

            if let Err(e) = result {
                warn!(
                    client = %client_addr,
                    request_id = %request_id,
                    duration_ms = duration.as_millis(),
                    error = %e,
                    "connection handling failed"
                );
            } else {
                debug!(
                    client = %client_addr,
                    request_id = %request_id,
                    duration_ms = duration.as_millis(),
                    "connection completed"
                );
            }
        });
    }
}
