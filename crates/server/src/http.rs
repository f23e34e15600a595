//! HTTP server implementation using Axum
//!
//! Every router served here gets the same middleware stack, outermost first:
//! request id assignment, tracing span, request id propagation, request
//! timeout, request metrics.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    Router,
};
use observability::HttpMetrics;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Span};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::traits::Server;

/// Request id header, set when the caller did not send one
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP server wrapping an Axum router
#[derive(Clone)]
pub struct HttpServer {
    config: ServerConfig,
    router: Router,
    running: Arc<AtomicBool>,
    bound_addr: Arc<RwLock<Option<SocketAddr>>>,
}

impl HttpServer {
    /// Serve `router` with the standard middleware stack
    pub fn new(config: ServerConfig, router: Router) -> Self {
        let router = with_middleware(router, &config);
        Self {
            config,
            router,
            running: Arc::new(AtomicBool::new(false)),
            bound_addr: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Router with middleware applied (for testing or inspection)
    pub fn router(&self) -> &Router {
        &self.router
    }
}

fn with_middleware(router: Router, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(PropagateRequestIdLayer::new(request_id))
            .layer(TimeoutLayer::new(config.request_timeout))
            .layer(middleware::from_fn(record_request)),
    )
}

fn make_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| request.uri().path());
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        route,
        request_id,
    )
}

async fn record_request(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let mut timer = HttpMetrics::new().start(&method, &route);
    let response = next.run(request).await;
    timer.set_status(response.status().as_u16());
    response
}

#[async_trait]
impl Server for HttpServer {
    fn name(&self) -> &str {
        "http"
    }

    fn address(&self) -> Option<SocketAddr> {
        *self.bound_addr.read()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self, shutdown_token: CancellationToken) -> Result<()> {
        let addr = self.config.http_addr()?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(addr.to_string(), e))?;
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;

        *self.bound_addr.write() = Some(local_addr);
        self.running.store(true, Ordering::SeqCst);
        info!(%local_addr, "HTTP server listening");

        let result = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
                info!("HTTP server draining connections");
            })
            .await;

        self.running.store(false, Ordering::SeqCst);
        *self.bound_addr.write() = None;

        match result {
            Ok(()) => {
                info!("HTTP server stopped");
                Ok(())
            }
            Err(e) => {
                error!(%e, "HTTP server error");
                Err(ServerError::Io(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ServerExt;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::time::Duration;
    use tower::ServiceExt;

    fn hello_router() -> Router {
        Router::new().route("/hello/:name", get(|| async { "hi" }))
    }

    #[tokio::test]
    async fn test_http_server_shutdown() {
        let server = HttpServer::new(ServerConfig::ephemeral(), hello_router());
        let watcher = server.clone();
        let (handle, token) = server.spawn();

        for _ in 0..50 {
            if watcher.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(watcher.address().is_some());

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(result.is_ok(), "server should stop within timeout");
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_request_id_is_assigned_and_propagated() {
        let server = HttpServer::new(ServerConfig::ephemeral(), hello_router());

        let response = server
            .router()
            .clone()
            .oneshot(Request::builder().uri("/hello/bob").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let response = server
            .router()
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/hello/bob")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc-123");
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        );
        let config = ServerConfig::ephemeral().with_request_timeout(Duration::from_millis(20));
        let server = HttpServer::new(config, router);

        let response = server
            .router()
            .clone()
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_http_server_name() {
        let server = HttpServer::new(ServerConfig::default(), hello_router());
        assert_eq!(server.name(), "http");
        assert_eq!(server.config().http_port, 8080);
    }
}
