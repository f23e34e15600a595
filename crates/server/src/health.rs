//! Liveness and readiness endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Health of one dependency (storage, worker pool, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentStatus {
    pub fn healthy(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: true,
            detail: Some(detail.into()),
        }
    }

    pub fn unhealthy(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: false,
            detail: Some(detail.into()),
        }
    }
}

/// Shared state behind the health routes
pub struct HealthState {
    pub service_name: String,
    start_time: Instant,
    components: RwLock<Vec<ComponentStatus>>,
}

impl HealthState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            start_time: Instant::now(),
            components: RwLock::new(Vec::new()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Insert or replace a component's status
    pub fn set_component(&self, status: ComponentStatus) {
        let mut components = self.components.write();
        components.retain(|c| c.name != status.name);
        components.push(status);
    }

    pub fn components(&self) -> Vec<ComponentStatus> {
        self.components.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.components.read().iter().all(|c| c.healthy)
    }
}

/// Liveness: the process is up and serving
pub async fn health_handler(State(state): State<Arc<HealthState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Readiness: every registered component is healthy
pub async fn readiness_handler(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<Value>) {
    let ready = state.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "degraded" },
            "service": state.service_name,
            "components": state.components(),
        })),
    )
}

/// `/health` and `/health/ready`
pub fn health_routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_component_replacement() {
        let state = HealthState::new("stockroom");
        state.set_component(ComponentStatus::unhealthy("storage", "connecting"));
        assert!(!state.is_ready());

        state.set_component(ComponentStatus::healthy("storage", "memory"));
        assert!(state.is_ready());
        assert_eq!(state.components().len(), 1);
    }

    #[tokio::test]
    async fn test_readiness_route_reflects_components() {
        let state = Arc::new(HealthState::new("stockroom"));
        state.set_component(ComponentStatus::unhealthy("reservation_pool", "stopped"));
        let router = health_routes(state.clone());

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
