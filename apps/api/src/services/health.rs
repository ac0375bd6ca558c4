//! Health check service for verifying external dependencies
//!
//! Readiness covers the PostgreSQL pool and the model server.

use playhead_llm_client::LlmClient;
use serde::Serialize;
use sqlx::PgPool;
use std::time::{Duration, Instant};

/// Status of an individual service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Service is healthy and responding
    Healthy,
    /// Service is unhealthy or unreachable
    Unhealthy,
    /// Service check was skipped (e.g., optional service not configured)
    Skipped,
}

/// Result of a single service health check
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    /// Name of the service
    pub name: &'static str,
    /// Current status
    pub status: ServiceStatus,
    /// Response time in milliseconds (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional details about the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceHealth {
    /// Create a healthy service result
    pub fn healthy(name: &'static str, response_time: Duration) -> Self {
        Self {
            name,
            status: ServiceStatus::Healthy,
            response_time_ms: Some(response_time.as_millis() as u64),
            error: None,
            details: None,
        }
    }

    /// Create a healthy service result with details
    pub fn healthy_with_details(
        name: &'static str,
        response_time: Duration,
        details: serde_json::Value,
    ) -> Self {
        Self {
            name,
            status: ServiceStatus::Healthy,
            response_time_ms: Some(response_time.as_millis() as u64),
            error: None,
            details: Some(details),
        }
    }

    /// Create an unhealthy service result
    pub fn unhealthy(name: &'static str, error: impl Into<String>) -> Self {
        Self {
            name,
            status: ServiceStatus::Unhealthy,
            response_time_ms: None,
            error: Some(error.into()),
            details: None,
        }
    }

    /// Create an unhealthy service result with response time
    pub fn unhealthy_with_time(
        name: &'static str,
        error: impl Into<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            name,
            status: ServiceStatus::Unhealthy,
            response_time_ms: Some(response_time.as_millis() as u64),
            error: Some(error.into()),
            details: None,
        }
    }

    /// Create a skipped service result (for optional services not configured)
    pub fn skipped(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            status: ServiceStatus::Skipped,
            response_time_ms: None,
            error: None,
            details: Some(serde_json::json!({ "reason": reason.into() })),
        }
    }
}

/// Aggregated health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResponse {
    /// Overall status (healthy only if all required services are healthy)
    pub status: ServiceStatus,
    /// Individual service health results
    pub services: Vec<ServiceHealth>,
    /// Total time to complete all health checks
    pub total_time_ms: u64,
    /// API version
    pub version: &'static str,
}

impl HealthCheckResponse {
    /// Create a new health check response from individual service results
    pub fn new(services: Vec<ServiceHealth>, total_time: Duration) -> Self {
        let status = if services
            .iter()
            .all(|s| s.status == ServiceStatus::Healthy || s.status == ServiceStatus::Skipped)
        {
            ServiceStatus::Healthy
        } else {
            ServiceStatus::Unhealthy
        };

        Self {
            status,
            services,
            total_time_ms: total_time.as_millis() as u64,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Check if overall health is good
    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

/// Health check service for verifying external dependencies
#[derive(Clone, Default)]
pub struct HealthService {
    pool: Option<PgPool>,
    llm: Option<LlmClient>,
}

impl HealthService {
    /// Checks only what is given; missing dependencies are reported as skipped
    pub fn new(pool: Option<PgPool>, llm: Option<LlmClient>) -> Self {
        Self { pool, llm }
    }

    /// Check PostgreSQL connectivity through the shared pool
    pub async fn check_database(&self) -> ServiceHealth {
        let Some(pool) = &self.pool else {
            return ServiceHealth::skipped("database", "No database pool configured");
        };
        let start = Instant::now();

        match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
            Ok(_) => {
                let elapsed = start.elapsed();
                let version = sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_optional(pool)
                    .await
                    .ok()
                    .flatten();

                match version {
                    Some(v) => ServiceHealth::healthy_with_details(
                        "database",
                        elapsed,
                        serde_json::json!({ "version": v }),
                    ),
                    None => ServiceHealth::healthy("database", elapsed),
                }
            }
            Err(e) => ServiceHealth::unhealthy_with_time(
                "database",
                format!("Query failed: {}", e),
                start.elapsed(),
            ),
        }
    }

    /// Check that the model server answers its model listing
    pub async fn check_llm(&self) -> ServiceHealth {
        let Some(llm) = &self.llm else {
            return ServiceHealth::skipped("llm", "No model server configured");
        };
        let start = Instant::now();
        let config = llm.config();

        match llm.health_check().await {
            Ok(true) => ServiceHealth::healthy_with_details(
                "llm",
                start.elapsed(),
                serde_json::json!({
                    "provider": config.provider.to_string(),
                    "model": config.model,
                }),
            ),
            Ok(false) => ServiceHealth::unhealthy_with_time(
                "llm",
                "Model server answered with an error status",
                start.elapsed(),
            ),
            Err(e) => ServiceHealth::unhealthy_with_time(
                "llm",
                format!("Request failed: {}", e),
                start.elapsed(),
            ),
        }
    }

    /// Run all health checks in parallel
    pub async fn check_all(&self) -> HealthCheckResponse {
        let start = Instant::now();

        let (db_health, llm_health) = tokio::join!(self.check_database(), self.check_llm());

        HealthCheckResponse::new(vec![db_health, llm_health], start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_health_healthy() {
        let health = ServiceHealth::healthy("test", Duration::from_millis(50));
        assert_eq!(health.status, ServiceStatus::Healthy);
        assert_eq!(health.response_time_ms, Some(50));
        assert!(health.error.is_none());
    }

    #[test]
    fn test_service_health_unhealthy() {
        let health = ServiceHealth::unhealthy("test", "Connection refused");
        assert_eq!(health.status, ServiceStatus::Unhealthy);
        assert!(health.response_time_ms.is_none());
        assert_eq!(health.error, Some("Connection refused".to_string()));
    }

    #[test]
    fn test_service_health_skipped() {
        let health = ServiceHealth::skipped("test", "Not configured");
        assert_eq!(health.status, ServiceStatus::Skipped);
    }

    #[test]
    fn test_health_check_response_all_healthy() {
        let services = vec![
            ServiceHealth::healthy("db", Duration::from_millis(10)),
            ServiceHealth::healthy("llm", Duration::from_millis(5)),
        ];
        let response = HealthCheckResponse::new(services, Duration::from_millis(15));
        assert!(response.is_healthy());
        assert_eq!(response.status, ServiceStatus::Healthy);
    }

    #[test]
    fn test_health_check_response_one_unhealthy() {
        let services = vec![
            ServiceHealth::healthy("db", Duration::from_millis(10)),
            ServiceHealth::unhealthy("llm", "Connection refused"),
        ];
        let response = HealthCheckResponse::new(services, Duration::from_millis(15));
        assert!(!response.is_healthy());
        assert_eq!(response.status, ServiceStatus::Unhealthy);
    }

    #[test]
    fn test_health_check_response_with_skipped() {
        let services = vec![
            ServiceHealth::healthy("db", Duration::from_millis(10)),
            ServiceHealth::skipped("optional", "Not configured"),
        ];
        let response = HealthCheckResponse::new(services, Duration::from_millis(15));
        assert!(response.is_healthy());
    }

    #[tokio::test]
    async fn test_unconfigured_dependencies_are_skipped() {
        let response = HealthService::default().check_all().await;
        assert!(response.is_healthy());
        assert!(response
            .services
            .iter()
            .all(|s| s.status == ServiceStatus::Skipped));
    }

    #[tokio::test]
    async fn test_llm_check_against_mock_server() {
        use playhead_shared_config::{LlmConfig, LlmProvider};
        use playhead_test_utils::MockLlmServer;

        let server = MockLlmServer::start().await;
        server.mock_models().await;

        let llm = LlmClient::new(&LlmConfig::with_url(LlmProvider::OpenAi, server.url())).unwrap();
        let health = HealthService::new(None, Some(llm)).check_llm().await;
        assert_eq!(health.status, ServiceStatus::Healthy);
    }
}
