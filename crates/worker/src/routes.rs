//! Route configuration for the operational endpoints.

use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health - trust store connectivity.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.metadata.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    version: env!("CARGO_PKG_VERSION"),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Create the operational router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_check));

    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigwarden_core::config::AppConfig;
    use sigwarden_metadata::{MetadataStore, SqliteStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_check_ok() {
        let temp = tempfile::tempdir().unwrap();
        let store: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp.path().join("trust.db"), None)
                .await
                .unwrap(),
        );
        let state = AppState::new(AppConfig::for_testing(), store);

        let (status, Json(body)) = health_check(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert!(body.error.is_none());
    }

    #[tokio::test]
    async fn test_router_builds_without_metrics() {
        let temp = tempfile::tempdir().unwrap();
        let store: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp.path().join("trust.db"), None)
                .await
                .unwrap(),
        );
        let mut config = AppConfig::for_testing();
        config.server.metrics_enabled = false;

        let _router = create_router(AppState::new(config, store));
    }
}
