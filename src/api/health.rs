use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::controller::{AppState, TaskStatus};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

/// Individual health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    reconciliation: ComponentHealth,
}

/// Health status of a component
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<TaskStatus>,
}

impl ComponentHealth {
    fn healthy(task: TaskStatus) -> Self {
        Self {
            status: "healthy".to_string(),
            error: None,
            task: Some(task),
        }
    }

    fn unhealthy(error: String, task: TaskStatus) -> Self {
        Self {
            status: "unhealthy".to_string(),
            error: Some(error),
            task: Some(task),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /health - Health check endpoint
///
/// Degraded while the latest reconciliation pass had a failing site
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let reconciliation = check_reconciliation(&state).await;
    let all_healthy = reconciliation.is_healthy();

    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: chrono::Utc::now(),
        checks: HealthChecks { reconciliation },
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

async fn check_reconciliation(state: &AppState) -> ComponentHealth {
    let task = state.reconciler.status().await;
    match task.last_error.clone() {
        Some(error) => ComponentHealth::unhealthy(error, task),
        None => ComponentHealth::healthy(task),
    }
}

/// GET /health/live - Liveness check
pub async fn liveness_check() -> impl IntoResponse {
    StatusCode::OK
}
