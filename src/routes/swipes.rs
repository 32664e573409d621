use actix_web::{web, HttpResponse};
use std::str::FromStr;
use validator::Validate;

use crate::error::EngineError;
use crate::models::{PageQuery, SwipeAction, SwipeRequest};
use crate::routes::{invalid, AppState, RequesterId};
use crate::services::{Notifier, Store};

pub fn configure<S: Store, N: Notifier>(cfg: &mut web::ServiceConfig) {
    // `undo` must be registered before the `{target_id}` pattern
    cfg.route("/swipe/undo", web::post().to(undo_last_swipe::<S, N>))
        .route("/swipe/{target_id}", web::post().to(record_swipe::<S, N>))
        .route("/swipes/received", web::get().to(received_likes::<S, N>));
}

/// POST /api/v1/swipe/{targetId}
///
/// Body: `{"action": "like" | "dislike" | "superlike"}`
async fn record_swipe<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    path: web::Path<String>,
    body: web::Json<SwipeRequest>,
) -> Result<HttpResponse, EngineError> {
    body.validate().map_err(invalid)?;
    let action = SwipeAction::from_str(&body.action).map_err(EngineError::InvalidAction)?;
    let target_id = path.into_inner();

    let outcome = state
        .ledger
        .record_swipe(requester.as_str(), &target_id, action)
        .await?;

    state
        .invalidate(&[requester.as_str(), target_id.as_str()])
        .await;

    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/v1/swipe/undo
async fn undo_last_swipe<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
) -> Result<HttpResponse, EngineError> {
    let outcome = state.ledger.undo_last_swipe(requester.as_str()).await?;

    state
        .invalidate(&[requester.as_str(), outcome.undone_swipe.to_user.as_str()])
        .await;

    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /api/v1/swipes/received
async fn received_likes<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, EngineError> {
    query.validate().map_err(invalid)?;

    let page = state
        .ledger
        .received_likes(requester.as_str(), query.page, query.limit)
        .await?;

    Ok(HttpResponse::Ok().json(page))
}
