mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::{Config, StoreBackend};
use db::{DBClient, MemoryStore, Store};
use dotenv::dotenv;
use routes::create_router;
use service::{
    feed::ReferralFeed, identity::IdentityProvider, ledger::ReferralLedger,
    session::SessionService, withdrawal::WithdrawalService,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub identity: Arc<IdentityProvider>,
    pub sessions: Arc<SessionService>,
    pub ledger: Arc<ReferralLedger>,
    pub withdrawals: Arc<WithdrawalService>,
    pub feed: Arc<ReferralFeed>,
}

impl AppState {
    pub fn new(env: Config, db_client: Arc<dyn Store>) -> Self {
        let feed = Arc::new(ReferralFeed::new());

        AppState {
            identity: Arc::new(IdentityProvider::new(
                db_client.clone(),
                env.jwt_secret.clone(),
                env.jwt_maxage,
            )),
            sessions: Arc::new(SessionService::new(db_client.clone())),
            ledger: Arc::new(ReferralLedger::new(
                db_client.clone(),
                feed.clone(),
                env.referral_reward_points,
            )),
            withdrawals: Arc::new(WithdrawalService::new(
                db_client,
                env.withdrawal_threshold_points,
            )),
            feed,
            env,
        }
    }
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;

            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("Failed to connect to the database")?;
            tracing::info!("Connection to the database is successful");

            let db_client = DBClient::new(pool);
            db_client.migrate().await.context("Failed to run migrations")?;

            Ok(Arc::new(db_client))
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::init();

    let log_level = config
        .as_ref()
        .ok()
        .and_then(|config| config.log_level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::DEBUG);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    let config = config.context("Invalid configuration")?;

    let store = connect_store(&config).await?;
    let app_state = AppState::new(config.clone(), store);

    let app = create_router(Arc::new(app_state)).layer(cors_layer(&config));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    tracing::info!("Server is running on http://localhost:{}", config.port);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
