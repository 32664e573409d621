use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::error::EngineError;
use crate::models::{BlockRequest, Match, MessageActivityRequest, PageQuery};
use crate::routes::{invalid, AppState, RequesterId};
use crate::services::{Notifier, Store};

pub fn configure<S: Store, N: Notifier>(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches", web::get().to(list_matches::<S, N>))
        .route("/matches/{match_id}", web::get().to(get_match::<S, N>))
        .route("/matches/{match_id}/unmatch", web::post().to(unmatch::<S, N>))
        .route("/matches/{match_id}/block", web::post().to(block::<S, N>))
        .route("/matches/{match_id}/messages", web::post().to(record_message::<S, N>))
        .route("/matches/{match_id}/read", web::post().to(mark_read::<S, N>));
}

async fn invalidate_members<S: Store, N: Notifier>(state: &AppState<S, N>, m: &Match) {
    state.invalidate(&[m.users.low.as_str(), m.users.high.as_str()]).await;
}

fn parse_block_request(body: &[u8]) -> Result<BlockRequest, EngineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(BlockRequest::default());
    }

    serde_json::from_slice(body).map_err(|e| EngineError::InvalidAction(format!("Invalid JSON: {}", e)))
}

/// GET /api/v1/matches
async fn list_matches<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, EngineError> {
    query.validate().map_err(invalid)?;

    let page = state
        .matches
        .list_active_matches(requester.as_str(), query.page, query.limit)
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/v1/matches/{matchId}
async fn get_match<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, EngineError> {
    let summary = state
        .matches
        .get_match(path.into_inner(), requester.as_str())
        .await?;

    Ok(HttpResponse::Ok().json(summary))
}

/// POST /api/v1/matches/{matchId}/unmatch
async fn unmatch<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, EngineError> {
    let updated = state
        .matches
        .unmatch(path.into_inner(), requester.as_str())
        .await?;

    invalidate_members(&state, &updated).await;
    Ok(HttpResponse::Ok().json(updated))
}

/// POST /api/v1/matches/{matchId}/block
///
/// Body (optional): `{"reason": "..."}`. An empty body blocks without a
/// reason; anything else must be valid JSON.
async fn block<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, EngineError> {
    let body = parse_block_request(&body)?;
    body.validate().map_err(invalid)?;

    let updated = state
        .matches
        .block(path.into_inner(), requester.as_str(), body.reason)
        .await?;

    invalidate_members(&state, &updated).await;
    Ok(HttpResponse::Ok().json(updated))
}

/// POST /api/v1/matches/{matchId}/messages
///
/// Called by the messaging service after it stored a message from the requester.
async fn record_message<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    path: web::Path<Uuid>,
    body: web::Json<MessageActivityRequest>,
) -> Result<HttpResponse, EngineError> {
    body.validate().map_err(invalid)?;

    let updated = state
        .matches
        .record_message(path.into_inner(), requester.as_str(), &body.preview)
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// POST /api/v1/matches/{matchId}/read
async fn mark_read<S: Store, N: Notifier>(
    state: web::Data<AppState<S, N>>,
    requester: RequesterId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, EngineError> {
    let updated = state
        .matches
        .mark_read(path.into_inner(), requester.as_str())
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}
