use actix_web::{web, HttpResponse};

use crate::error::EngineError;
use crate::models::UserStatsResponse;
use crate::routes::{AppState, RequesterId};
use crate::services::{CacheKey, Notifier, Store};

pub fn configure<S: Store, N: Notifier>(cfg: &mut web::ServiceConfig) {
    cfg.route("/stats", web::get().to(user_stats::<S, N>));
}

/// GET /api/v1/stats
///
/// Served from the cache when possible; writes that change these numbers
/// invalidate the entry for both users involved.
async fn user_stats<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
) -> Result<HttpResponse, EngineError> {
    let key = CacheKey::stats(requester.as_str());

    if let Some(cache) = &state.cache {
        if let Ok(cached) = cache.get::<UserStatsResponse>(&key).await {
            tracing::debug!("Returning cached stats for {}", requester.as_str());
            return Ok(HttpResponse::Ok().json(cached));
        }
    }

    let stats = state.ledger.user_stats(requester.as_str()).await?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&key, &stats).await {
            tracing::warn!("Failed to cache stats for {}: {}", requester.as_str(), e);
        }
    }

    Ok(HttpResponse::Ok().json(stats))
}
