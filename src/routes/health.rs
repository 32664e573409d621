use actix_web::{web, HttpResponse, Responder};

use crate::models::HealthResponse;
use crate::routes::AppState;
use crate::services::{Notifier, Store};

pub fn configure<S: Store, N: Notifier>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check::<S, N>));
}

/// Health check endpoint
///
/// Always answers 200; a failing store only degrades the status. Redis
/// reachability is reported but never degrades it.
async fn health_check<S: Store, N: Notifier>(state: web::Data<AppState<S, N>>) -> impl Responder {
    let store_healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let cache = match &state.cache {
        Some(cache) => Some(cache.stats().await),
        None => None,
    };

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache,
        timestamp: chrono::Utc::now(),
    })
}
