//! Agentic Journal Edge Services
//!
//! Small HTTP services that sit between the static submission portal and
//! the outside world.
//!
//! ## Services
//!
//! - **Notify**: Author emails for received submissions, reviews and revisions
//! - **Metrics**: View, download and trending counters per paper
//! - **OAuth**: GitHub authorization code exchange
//! - **Upload**: Signed PDF uploads, authenticated downloads and review issues
//!
//! `SERVICES` selects which of them this process mounts.

mod clock;
mod config;
mod db;
mod email;
mod error;
mod github;
mod handlers;
mod models;
mod signing;
mod store;
mod templates;
mod validation;

use clock::SystemClock;
use config::Service;
use email::EmailClient;
use github::GitHubClient;
use handlers::AppState;
use std::sync::Arc;
use store::{FsObjectStore, KvStore, MemoryKvStore, PgKvStore};
use templates::Templates;
use tokio::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "journal_edge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Agentic Journal edge services");
    tracing::info!("Environment: {:?}", config.environment);
    tracing::info!("Services: {:?}", config.services);

    let kv: Arc<dyn KvStore> = match &config.database_url {
        Some(url) if config.serves(Service::Metrics) => {
            tracing::info!("Connecting to database...");
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgKvStore::new(pool))
        }
        _ => {
            if config.serves(Service::Metrics) {
                tracing::warn!("DATABASE_URL not set, metrics are kept in memory only");
            }
            Arc::new(MemoryKvStore::default())
        }
    };

    // Ensure storage directory exists
    fs::create_dir_all(&config.storage_dir).await?;
    tracing::info!("PDF storage: {:?}", config.storage_dir);

    let http = reqwest::Client::builder()
        .user_agent(github::USER_AGENT)
        .build()?;

    let state = AppState {
        github: GitHubClient::new(http.clone(), config.github.clone()),
        email: EmailClient::new(http, &config.email),
        objects: Arc::new(FsObjectStore::new(config.storage_dir.clone())),
        templates: Arc::new(Templates::new()?),
        clock: Arc::new(SystemClock),
        kv,
        config: Arc::new(config),
    };

    let addr = state.config.server_addr();
    let app = handlers::router(state);

    // Start server
    tracing::info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
