// Route exports
pub mod auth;
pub mod discover;
pub mod health;
pub mod matches;
pub mod stats;
pub mod swipes;

use actix_web::{error, web, HttpRequest};
use std::sync::Arc;
use validator::ValidationErrors;

use crate::config::{DiscoverySettings, MatchingSettings};
use crate::core::{DiscoveryRanker, MatchManager, SwipeLedger};
use crate::error::EngineError;
use crate::services::{CacheManager, Notifier, Store};

pub use auth::{Claims, RequesterId, TokenVerifier};

/// Application state shared across all handlers
pub struct AppState<S, N> {
    pub store: Arc<S>,
    pub discovery: DiscoveryRanker<S>,
    pub ledger: SwipeLedger<S, N>,
    pub matches: MatchManager<S, N>,
    pub cache: Option<Arc<CacheManager>>,
}

impl<S, N> Clone for AppState<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            discovery: self.discovery.clone(),
            ledger: self.ledger.clone(),
            matches: self.matches.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S: Store, N: Notifier> AppState<S, N> {
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        discovery: DiscoverySettings,
        matching: MatchingSettings,
        cache: Option<Arc<CacheManager>>,
    ) -> Self {
        let matches = MatchManager::new(Arc::clone(&store), notifier, matching);
        let ledger = SwipeLedger::new(Arc::clone(&store), matches.clone());

        Self {
            discovery: DiscoveryRanker::new(Arc::clone(&store), discovery),
            ledger,
            matches,
            store,
            cache,
        }
    }

    /// Drop cached per-user responses after a write touching these users
    pub async fn invalidate(&self, user_ids: &[&str]) {
        if let Some(cache) = &self.cache {
            cache.invalidate_users(user_ids).await;
        }
    }
}

/// Register the `/api/v1` routes and the JSON error handlers
pub fn configure_routes<S: Store, N: Notifier>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
        .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
        .app_data(web::PathConfig::default().error_handler(handle_path_error))
        .service(
            web::scope("/api/v1")
                .configure(health::configure::<S, N>)
                .configure(discover::configure::<S, N>)
                .configure(swipes::configure::<S, N>)
                .configure(matches::configure::<S, N>)
                .configure(stats::configure::<S, N>),
        );
}

/// Turn validator failures into a 400
pub(crate) fn invalid(errors: ValidationErrors) -> EngineError {
    EngineError::InvalidAction(errors.to_string())
}

pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    EngineError::InvalidAction(format!("Invalid JSON: {}", err)).into()
}

pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    EngineError::InvalidAction(format!("Invalid query: {}", err)).into()
}

/// Malformed ids in the path can never name an existing resource
pub fn handle_path_error(err: error::PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!("Path error on {}: {}", req.path(), err);
    EngineError::NotFound(format!("{}", req.path())).into()
}
