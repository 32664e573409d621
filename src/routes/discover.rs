use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::EngineError;
use crate::models::{DiscoverQuery, RefreshLocationRequest, RefreshLocationResponse};
use crate::routes::{invalid, AppState, RequesterId};
use crate::services::{Notifier, Store};

pub fn configure<S: Store, N: Notifier>(cfg: &mut web::ServiceConfig) {
    cfg.route("/discover", web::get().to(discover::<S, N>))
        .route("/discover/refresh", web::post().to(refresh_location::<S, N>));
}

/// GET /api/v1/discover
///
/// Query: `page`, `limit`, `maxDistance`, `ageMin`, `ageMax`, and an optional
/// `latitude`/`longitude` pair that refreshes the requester's location first.
async fn discover<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    query: web::Query<DiscoverQuery>,
) -> Result<HttpResponse, EngineError> {
    query.validate().map_err(invalid)?;

    let filters = state.discovery.resolve_filters(&query)?;
    tracing::debug!("Discovery for {} with {:?}", requester.as_str(), filters);

    let page = state.discovery.discover(requester.as_str(), filters).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// POST /api/v1/discover/refresh
async fn refresh_location<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    body: web::Json<RefreshLocationRequest>,
) -> Result<HttpResponse, EngineError> {
    body.validate().map_err(invalid)?;

    let location = state
        .discovery
        .refresh_location(requester.as_str(), body.latitude, body.longitude)
        .await?;

    Ok(HttpResponse::Ok().json(RefreshLocationResponse {
        success: true,
        location,
    }))
}
