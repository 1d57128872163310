/// Liveness and readiness endpoints
use crate::db::PostStore;
use crate::search::SearchIndex;
use actix_web::{web, HttpResponse};
use blog_cache::CacheStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

pub struct HealthState {
    store: Arc<dyn PostStore>,
    cache: Arc<dyn CacheStore>,
    search: Arc<dyn SearchIndex>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    status: ComponentStatus,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

impl HealthState {
    pub fn new(
        store: Arc<dyn PostStore>,
        cache: Arc<dyn CacheStore>,
        search: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            store,
            cache,
            search,
        }
    }
}

fn component<E: Display>(
    result: std::result::Result<(), E>,
    started: Instant,
    name: &str,
    failure_status: ComponentStatus,
) -> ComponentCheck {
    let latency_ms = Some(started.elapsed().as_millis() as u64);
    match result {
        Ok(()) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: format!("{} reachable", name),
            latency_ms,
        },
        Err(e) => ComponentCheck {
            status: failure_status,
            message: format!("{} check failed: {}", name, e),
            latency_ms,
        },
    }
}

pub async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    match state.store.ping().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "blog-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "blog-service"
        })),
    }
}

/// PostgreSQL is required. Redis and Elasticsearch failures degrade the
/// service (reads fall back to PostgreSQL) without taking it out of rotation.
pub async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();

    let start = Instant::now();
    let postgres = component(
        state.store.ping().await,
        start,
        "PostgreSQL",
        ComponentStatus::Unhealthy,
    );
    let ready = matches!(postgres.status, ComponentStatus::Healthy);
    checks.insert("postgresql".to_string(), postgres);

    let start = Instant::now();
    let redis = component(
        state.cache.ping().await,
        start,
        "Redis",
        ComponentStatus::Degraded,
    );
    checks.insert("redis".to_string(), redis);

    let start = Instant::now();
    let elasticsearch = component(
        state.search.ping().await,
        start,
        "Elasticsearch",
        ComponentStatus::Degraded,
    );
    checks.insert("elasticsearch".to_string(), elasticsearch);

    let degraded = checks
        .values()
        .any(|c| !matches!(c.status, ComponentStatus::Healthy));
    let status = if !ready {
        ComponentStatus::Unhealthy
    } else if degraded {
        ComponentStatus::Degraded
    } else {
        ComponentStatus::Healthy
    };

    let response = ReadinessResponse {
        ready,
        status,
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

pub async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}
