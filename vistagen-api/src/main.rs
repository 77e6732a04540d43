//! # Vistagen API Server
//!
//! Serves the usage-gated generation API.
//!
//! ## Startup
//!
//! - `DATABASE_URL` set: PostgreSQL account store (migrations run on boot),
//!   otherwise an in-memory store
//! - `GEMINI_API_KEY` set: Gemini services, otherwise offline mocks (demo mode)
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p vistagen-api
//! ```

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vistagen_api::app::{build_router, AppState, Services};
use vistagen_api::config::Config;
use vistagen_shared::clock::SystemClock;
use vistagen_shared::db::{self, pool::DatabaseConfig};
use vistagen_shared::store::memory::InMemoryAccountStore;
use vistagen_shared::store::postgres::PgAccountStore;
use vistagen_shared::store::AccountStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vistagen_api=debug,vistagen_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Vistagen API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let (store, pool) = match &config.database {
        Some(database) => {
            db::migrations::ensure_database_exists(&database.url).await?;
            let pool = db::pool::create_pool(DatabaseConfig {
                url: database.url.clone(),
                max_connections: database.max_connections,
                ..Default::default()
            })
            .await?;
            db::migrations::run_migrations(&pool).await?;
            tracing::info!("Using PostgreSQL account store");
            let store: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(pool.clone()));
            (store, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, accounts are kept in memory");
            let store: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
            (store, None)
        }
    };

    let services = if config.demo_mode() {
        tracing::warn!("GEMINI_API_KEY not set, running in demo mode with mock services");
        Services::mock(&config)
    } else {
        Services::gemini(&config)?
    };

    let bind_address = config.bind_address();
    let mut state = AppState::new(config, store, Arc::new(SystemClock), services);
    if let Some(pool) = pool.clone() {
        state = state.with_database(pool);
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        db::pool::close_pool(pool).await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
