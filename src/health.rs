//! Health check module
//! Provides health status for the application and its dependencies

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::error;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Runs dependency checks for the health endpoint
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: PgPool,
}

impl HealthChecker {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn check(&self) -> HealthStatus {
        let mut checks = HashMap::new();

        let start = Instant::now();
        let database = match timeout(
            CHECK_TIMEOUT,
            sqlx::query("SELECT 1").execute(&self.db_pool),
        )
        .await
        {
            Ok(Ok(_)) => ComponentHealth::up(Some(start.elapsed().as_millis())),
            Ok(Err(e)) => {
                error!(error = %e, "database health check failed");
                ComponentHealth::down(Some(e.to_string()))
            }
            Err(_) => {
                error!("database health check timed out");
                ComponentHealth::down(Some("timed out".to_string()))
            }
        };
        checks.insert("database".to_string(), database);

        let status = if checks.values().all(|c| c.status == ComponentState::Up) {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };

        HealthStatus {
            status,
            checks,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// GET /health
pub async fn health_handler(State(checker): State<HealthChecker>) -> impl IntoResponse {
    let status = checker.check().await;
    let code = if status.status == HealthState::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
