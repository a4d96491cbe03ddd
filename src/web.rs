//! Health and metrics endpoints.

use crate::metrics::{ControllerMetrics, MetricsSnapshot};
use crate::shutdown::Shutdown;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn metrics_snapshot(State(metrics): State<Arc<ControllerMetrics>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

pub fn build_router(metrics: Arc<ControllerMetrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_snapshot))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serves the router on `addr` until `shutdown` fires.
pub async fn serve(
    addr: SocketAddr,
    metrics: Arc<ControllerMetrics>,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Metrics endpoint listening");

    axum::serve(listener, build_router(metrics))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_reports_ok() {
        let (status, body) = get_json(build_router(Arc::default()), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_exposes_counters() {
        let metrics = Arc::new(ControllerMetrics::default());
        metrics.on_pass();
        metrics.on_deleted();
        metrics.on_deleted();

        let (status, body) = get_json(build_router(metrics), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["passes_total"], 1);
        assert_eq!(body["deletions"], 2);
        assert_eq!(body["delete_failures"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = build_router(Arc::default())
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
