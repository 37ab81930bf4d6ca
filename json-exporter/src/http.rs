//! HTTP server for the probe, metrics and landing endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::metrics::SharedMetrics;
use crate::probe::{ProbeParams, Prober};

/// Content type of the OpenMetrics text exposition format.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    prober: Arc<Prober>,
    metrics: SharedMetrics,
    index: Arc<str>,
}

/// Create the HTTP router.
pub fn create_router(
    prober: Arc<Prober>,
    metrics: SharedMetrics,
    server: &ServerConfig,
) -> Router {
    let state = AppState {
        prober,
        metrics,
        index: render_index(&server.probe_path, &server.metrics_path).into(),
    };

    Router::new()
        .route("/", get(index_handler))
        .route(&server.probe_path, get(probe_handler))
        .route(&server.metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Landing page linking to the other endpoints.
fn render_index(probe_path: &str, metrics_path: &str) -> String {
    format!(
        r#"<html>
<head><title>JSON Exporter</title></head>
<body>
<h1>JSON Exporter</h1>
<p><a href="{probe_path}">Run a probe</a></p>
<p><a href="{metrics_path}">Metrics</a></p>
</body>
</html>
"#
    )
}

/// Handler for the landing page.
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(state.index.to_string())
}

/// Handler for the probe endpoint.
async fn probe_handler(
    State(state): State<AppState>,
    Query(params): Query<ProbeParams>,
) -> Response {
    match state.prober.probe(&params).await {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Handler for the exporter's own metrics.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode exporter metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    prober: Arc<Prober>,
    metrics: SharedMetrics,
    listen_addr: SocketAddr,
    server: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        prober: Arc<Prober>,
        metrics: SharedMetrics,
        listen_addr: SocketAddr,
        server: ServerConfig,
    ) -> Self {
        Self {
            prober,
            metrics,
            listen_addr,
            server,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let router = create_router(self.prober, self.metrics, &self.server);

        info!(
            addr = %addr,
            probe_path = %self.server.probe_path,
            metrics_path = %self.server.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExporterConfig;
    use crate::fetch::{FetchError, Fetcher};
    use crate::metrics::{ExporterMetrics, ProbeOutcome};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct StaticFetcher(Value);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _target: &str) -> Result<Value, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn make_router(config: &ExporterConfig) -> (Router, SharedMetrics) {
        let metrics = Arc::new(ExporterMetrics::new());
        let fetcher = Arc::new(StaticFetcher(json!({"up": true, "load": [0.5, 0.25]})));
        let prober = Arc::new(Prober::new(fetcher, config, metrics.clone()));
        (create_router(prober, metrics.clone(), &config.server), metrics)
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_page() {
        let (router, _) = make_router(&ExporterConfig::default());

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("href=\"/probe\""));
        assert!(body.contains("href=\"/metrics\""));
    }

    #[tokio::test]
    async fn test_probe_endpoint() {
        let (router, _) = make_router(&ExporterConfig::default());

        let response = router
            .oneshot(
                Request::get("/probe?target=http://example.invalid/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().contains("openmetrics-text"));

        let body = body_string(response).await;
        assert!(body.contains("# TYPE up gauge"));
        assert!(body.contains("# TYPE load__1 gauge"));
    }

    #[tokio::test]
    async fn test_probe_missing_target() {
        let (router, metrics) = make_router(&ExporterConfig::default());

        let response = router
            .oneshot(Request::get("/probe").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("Target parameter is missing"));
        assert_eq!(metrics.probe_count(ProbeOutcome::MissingTarget), 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (router, _) = make_router(&ExporterConfig::default());

        let response = router
            .clone()
            .oneshot(Request::get("/probe").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("json_exporter_probes_total{outcome=\"missing_target\"} 1"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (router, _) = make_router(&ExporterConfig::default());

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_paths() {
        let mut config = ExporterConfig::default();
        config.server.probe_path = "/json/probe".to_string();
        config.server.metrics_path = "/json/metrics".to_string();
        let (router, _) = make_router(&config);

        let response = router
            .clone()
            .oneshot(
                Request::get("/json/probe?target=http://example.invalid/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(Request::get("/json/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Default paths should 404
        let response = router
            .oneshot(Request::get("/probe").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
