mod app;
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::auth::jwt::TokenCodec;
use crate::auth::rate_limit::SlidingWindowLimiter;
use crate::auth::services::SessionService;
use crate::config::Config;
use crate::db::repositories::{PgSessionStore, PgUserStore};
use crate::store::memory::{MemorySessionStore, MemoryUserStore};
use crate::store::{SessionStore, UserStore};

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,admin_auth=debug,tower_http=info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_stores(config: &Config) -> anyhow::Result<(Arc<dyn UserStore>, Arc<dyn SessionStore>)> {
    match &config.database_url {
        Some(url) => {
            let pool = db::connection::create_pool(url)?;
            tracing::info!("Connected to Postgres");
            Ok((
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgSessionStore::new(pool)),
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores (NOT FOR PRODUCTION)");
            Ok((
                Arc::new(MemoryUserStore::new()),
                Arc::new(MemorySessionStore::new()),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let config = Config::from_env().context("Invalid configuration")?;
    let (users, sessions) = build_stores(&config)?;

    let codec = TokenCodec::new(
        &config.access_secret,
        &config.refresh_secret,
        config.access_ttl_minutes,
        config.refresh_ttl_days,
    );
    let service = SessionService::new(codec, users, sessions, config.refresh_ttl_days);
    let window = Duration::from_secs(config.rate_limit_window_minutes * 60);
    let limiter = SlidingWindowLimiter::new(config.rate_limit_max_attempts, window);
    let refresh_limiter =
        SlidingWindowLimiter::new(config.rate_limit_refresh_max_attempts, window);

    let state = AppState {
        service: Arc::new(service),
        limiter: Arc::new(limiter),
        refresh_limiter: Arc::new(refresh_limiter),
    };

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_url
                .parse::<HeaderValue>()
                .context("Invalid FRONTEND_URL")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let router = app::build_router(state).layer(cors);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Auth server listening on {addr}");

    axum::serve(listener, router).await?;
    Ok(())
}
