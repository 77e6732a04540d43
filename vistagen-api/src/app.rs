/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vistagen_api::app::{build_router, AppState, Services};
/// use vistagen_api::config::Config;
/// use vistagen_shared::clock::SystemClock;
/// use vistagen_shared::store::memory::InMemoryAccountStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let services = Services::mock(&config);
/// let state = AppState::new(
///     config,
///     Arc::new(InMemoryAccountStore::new()),
///     Arc::new(SystemClock),
///     services,
/// );
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::middleware::auth::{admin_key_layer, jwt_auth_layer};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use vistagen_engine::enrichment::EnrichmentStage;
use vistagen_engine::fanout::FanOutStage;
use vistagen_engine::orchestrator::GenerationOrchestrator;
use vistagen_engine::services::gemini::GeminiClient;
use vistagen_engine::services::mock::{
    MockArtifactService, MockEnrichmentService, MockVideoService,
};
use vistagen_engine::services::{ArtifactService, EnrichmentService, VideoService};
use vistagen_engine::video::VideoExtender;
use vistagen_shared::accounts::AccountService;
use vistagen_shared::clock::Clock;
use vistagen_shared::payment::{MockPaymentGateway, PaymentGateway};
use vistagen_shared::store::AccountStore;

/// External collaborators behind the pipeline
#[derive(Clone)]
pub struct Services {
    pub enrichment: Arc<dyn EnrichmentService>,
    pub artifacts: Arc<dyn ArtifactService>,
    pub video: Arc<dyn VideoService>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl Services {
    /// Gemini-backed generation with the simulated payment gateway
    ///
    /// # Errors
    ///
    /// Fails if Gemini is not configured or the HTTP client cannot be built.
    pub fn gemini(config: &Config) -> anyhow::Result<Self> {
        let gemini = config
            .gemini
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not configured"))?;
        let client = Arc::new(GeminiClient::new(gemini)?);

        Ok(Self {
            enrichment: client.clone(),
            artifacts: client.clone(),
            video: client,
            payments: Arc::new(MockPaymentGateway::with_latency(config.payment_latency)),
        })
    }

    /// Offline mocks (demo mode)
    pub fn mock(config: &Config) -> Self {
        Self {
            enrichment: Arc::new(MockEnrichmentService::new()),
            artifacts: Arc::new(MockArtifactService::succeeding()),
            video: Arc::new(MockVideoService::ready_after(2)),
            payments: Arc::new(MockPaymentGateway::with_latency(config.payment_latency)),
        }
    }
}

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    /// Account operations
    pub accounts: AccountService,

    /// Generation pipeline
    pub orchestrator: GenerationOrchestrator,

    /// Video pipeline
    pub video: VideoExtender,

    /// Payment gateway
    pub payments: Arc<dyn PaymentGateway>,

    /// Database pool, when the store is PostgreSQL
    pub db: Option<PgPool>,
}

impl AppState {
    /// Wires the pipeline from configuration, a store and services
    pub fn new(
        config: Config,
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        services: Services,
    ) -> Self {
        let accounts = AccountService::new(store, clock);

        let orchestrator = GenerationOrchestrator::new(
            accounts.clone(),
            EnrichmentStage::with_config(services.enrichment, config.enrichment()),
            FanOutStage::new(services.artifacts, config.fan_out()),
            config.orchestrator(),
        );

        let video = VideoExtender::new(services.video, config.video_extender());

        Self {
            config: Arc::new(config),
            accounts,
            orchestrator,
            video,
            payments: services.payments,
            db: None,
        }
    }

    /// Attaches the database pool used by the health check
    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/
///     ├── /auth/                     # Sessions (public)
///     │   ├── POST /register
///     │   └── POST /login
///     ├── GET  /account              # Account and quota (session)
///     ├── POST /generations          # Generate artifacts (session)
///     ├── POST /videos               # Animate an artifact (session)
///     ├── POST /subscriptions        # Buy a tier (session)
///     └── /admin/                    # Admin (x-admin-key)
///         ├── GET /accounts
///         └── PUT /accounts/:identity
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    // Session routes (require JWT authentication)
    let session_routes = Router::new()
        .route("/account", get(routes::account::get_account))
        .route("/generations", post(routes::generations::create_generation))
        .route("/videos", post(routes::videos::create_video))
        .route("/subscriptions", post(routes::subscriptions::subscribe))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Admin routes (require the admin key)
    let admin_routes = Router::new()
        .route("/accounts", get(routes::admin::list_accounts))
        .route("/accounts/:identity", put(routes::admin::update_account))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_key_layer,
        ));

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .merge(session_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(crate::middleware::auth::ADMIN_KEY_HEADER),
            ])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
