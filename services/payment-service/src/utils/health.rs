// /consult-payments/services/payment-service/src/utils/health.rs

use std::collections::HashMap;
use sqlx::PgPool;

#[derive(Debug, serde::Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, serde::Serialize, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, serde::Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

/// Health check: koneksi database dan kelengkapan konfigurasi webhook
pub async fn health_check(pool: &PgPool, webhook_auth_enabled: bool) -> HealthCheckResult {
    let mut checks = HashMap::new();

    checks.insert("database".to_string(), check_database_health(pool).await);
    checks.insert("webhook_auth".to_string(), ComponentHealth {
        name: "Webhook Basic Auth".to_string(),
        status: if webhook_auth_enabled {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        message: (!webhook_auth_enabled).then(|| "Webhook credentials not configured".to_string()),
        response_time_ms: None,
    });

    HealthCheckResult {
        status: determine_overall_status(&checks),
        checks,
        timestamp: chrono::Utc::now(),
    }
}

async fn check_database_health(pool: &PgPool) -> ComponentHealth {
    let start = std::time::Instant::now();

    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => ComponentHealth {
            name: "PostgreSQL".to_string(),
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            ComponentHealth {
                name: "PostgreSQL".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some("Database unreachable".to_string()),
                response_time_ms: None,
            }
        }
    }
}

fn determine_overall_status(checks: &HashMap<String, ComponentHealth>) -> HealthStatus {
    if checks.values().any(|h| h.status == HealthStatus::Unhealthy) {
        return HealthStatus::Unhealthy;
    }

    if checks.values().any(|h| h.status == HealthStatus::Degraded) {
        return HealthStatus::Degraded;
    }

    HealthStatus::Healthy
}
