use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use swipe_engine::config::Settings;
use swipe_engine::routes::{configure_routes, AppState, TokenVerifier};
use swipe_engine::services::{CacheManager, PostgresStore, PushClient};

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(what: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", what, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", what, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load();

    // LOG_LEVEL / LOG_FORMAT win over the config file
    let (config_level, config_format) = settings
        .as_ref()
        .map(|s| (s.logging.level.clone(), s.logging.format.clone()))
        .unwrap_or_else(|_| ("info".to_string(), "json".to_string()));
    let log_level = std::env::var("LOG_LEVEL").unwrap_or(config_level);
    let log_format = std::env::var("LOG_FORMAT").unwrap_or(config_format);
    init_tracing(&log_level, &log_format);

    info!("Starting swipe engine...");

    let settings = settings.map_err(|e| startup_error("Failed to load configuration", e))?;
    info!("Configuration loaded successfully");

    let store = Arc::new(
        PostgresStore::from_settings(&settings.database)
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
    );
    info!(
        "PostgreSQL store initialized (max: {} connections)",
        settings.database.max_connections.unwrap_or(10)
    );

    // Cache is optional; stats are computed from the store without it
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(60);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(10_000);
    let cache = match CacheManager::new(&settings.cache.redis_url, l1_cache_size, cache_ttl).await {
        Ok(c) => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
            Some(Arc::new(c))
        }
        Err(e) => {
            warn!("Failed to connect to Redis ({}), running without cache", e);
            None
        }
    };

    let notifier = Arc::new(
        PushClient::new(
            settings.push.endpoint.clone(),
            settings.push.api_key.clone(),
            Duration::from_secs(settings.push.timeout_secs.unwrap_or(10)),
        )
        .map_err(|e| startup_error("Failed to build push client", e))?,
    );
    if notifier.is_enabled() {
        info!("Push notifications enabled");
    } else {
        warn!("No push endpoint configured, notifications will only be logged");
    }

    let app_state = AppState::new(
        store,
        notifier,
        settings.discovery.clone(),
        settings.matching.clone(),
        cache,
    );
    let verifier = web::Data::new(TokenVerifier::new(
        &settings.auth.jwt_secret,
        settings.auth.issuer.clone(),
    ));

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(verifier.clone())
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(configure_routes::<PostgresStore, PushClient>)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
