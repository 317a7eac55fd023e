//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use sessiond_core::db::SessionCounts;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: HealthComponents,
    pub metrics: HealthMetrics,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthComponents {
    pub database: bool,
    pub control_plane_configured: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub sessions: SessionCounts,
    pub live_actors: usize,
    pub pending_alarms: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let ctx = state.registry.context();

    let db_healthy = ctx.db.ping().is_ok();
    let sessions = ctx.db.count_sessions().unwrap_or_default();

    let status = if db_healthy { "healthy" } else { "degraded" };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: HealthComponents {
            database: db_healthy,
            control_plane_configured: state.config.control_plane.url.is_some(),
        },
        metrics: HealthMetrics {
            sessions,
            live_actors: state.registry.live_actors().await,
            pending_alarms: ctx.alarms.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_health_reports_counts() {
        let app = TestApp::new();
        app.post_json("/initialize", r#"{"sessionId":"s1"}"#).await;

        let (status, body) = app.get("/health").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["database"], true);
        assert_eq!(body["components"]["controlPlaneConfigured"], false);
        assert_eq!(body["metrics"]["sessions"]["active"], 1);
        assert_eq!(body["metrics"]["pendingAlarms"], 1);
    }
}
