use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::Monitor;
use crate::models::SnapshotStore;

/// Shared handles for the query interface.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SnapshotStore>,
    pub monitor: Arc<Monitor>,
    /// On-demand mode: run a full cycle inline before answering.
    pub refresh_on_query: bool,
}

/// `GET /health-check`: the latest snapshot as
/// `{group: {category: [{service, port, status}]}}`, or 503 with an
/// "unavailable" body before the first cycle has completed.
pub async fn health_check(State(state): State<ApiState>) -> Response {
    if state.refresh_on_query {
        if let Err(err) = state.monitor.execute_cycle().await {
            warn!("On-demand cycle failed, serving last snapshot: {:#}", err);
        }
    }

    match state.store.read().await {
        Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unavailable",
                "message": "no health-check cycle has completed yet",
            })),
        )
            .into_response(),
    }
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .with_state(state)
}

pub async fn start_server(port: u16, state: ApiState) -> Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Health checks: http://localhost:{}/health-check", addr.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {}", port))?;
    axum::serve(listener, app).await.context("API server terminated")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::context::DockerEnv;
    use crate::models::{Snapshot, Status, Verdict};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn state(store: Arc<SnapshotStore>) -> ApiState {
        let startup: MonitorConfig = serde_yaml::from_str("{}").unwrap();
        let monitor = Monitor::new(
            PathBuf::from("config.yaml"),
            &startup,
            Arc::clone(&store),
            Arc::new(DockerEnv),
        );
        ApiState {
            store,
            monitor: Arc::new(monitor),
            refresh_on_query: false,
        }
    }

    #[tokio::test]
    async fn returns_unavailable_before_first_cycle() {
        let store = Arc::new(SnapshotStore::new());
        let response = health_check(State(state(store))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn returns_snapshot_after_publish() {
        let store = Arc::new(SnapshotStore::new());
        let mut categories = BTreeMap::new();
        categories.insert(
            "redis".to_string(),
            vec![Verdict {
                service: "redis-primary".to_string(),
                port: 6379,
                status: Status::Up,
            }],
        );
        let mut groups = BTreeMap::new();
        groups.insert("cache".to_string(), categories);
        store
            .publish(Snapshot {
                groups,
                completed_at: Utc::now(),
            })
            .await;

        let response = health_check(State(state(store))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
