/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated origins, or `*` (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (optional, in-memory store when absent)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for session signing (required, at least 32 chars)
/// - `ADMIN_API_KEY`: Key for the admin routes (optional, admin disabled when absent)
/// - `GEMINI_API_KEY`: Gemini key (optional, mock services when absent)
/// - `GEMINI_BASE_URL`, `ENRICHMENT_MODEL`, `IMAGE_MODEL`, `VIDEO_MODEL`
/// - `ENRICHMENT_TEMPERATURE` (default: 0.2)
/// - `GENERATION_VARIATIONS` (default: 3, at least 1)
/// - `GENERATION_STAGGER_MS` (default: 300)
/// - `ATTEMPT_TIMEOUT_SECS` (default: 120, 0 disables)
/// - `VIDEO_POLL_INTERVAL_SECS` (default: 3)
/// - `VIDEO_MAX_POLLS` (default: 100)
/// - `SERIALIZE_PER_ACCOUNT` (default: true)
/// - `PAYMENT_LATENCY_MS` (default: 2000)
///
/// # Example
///
/// ```no_run
/// use vistagen_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use vistagen_engine::enrichment::{EnrichmentConfig, DEFAULT_TEMPERATURE};
use vistagen_engine::fanout::FanOutConfig;
use vistagen_engine::orchestrator::OrchestratorConfig;
use vistagen_engine::services::gemini::GeminiConfig;
use vistagen_engine::video::VideoConfig;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration (None = in-memory store)
    pub database: Option<DatabaseConfig>,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Admin key (None = admin routes disabled)
    pub admin_api_key: Option<String>,

    /// Gemini settings (None = mock services)
    pub gemini: Option<GeminiConfig>,

    /// Pipeline tuning
    pub generation: GenerationConfig,

    /// Video tuning
    pub video: VideoSettings,

    /// Simulated payment latency
    pub payment_latency: Duration,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for session signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Generation pipeline settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub enrichment_temperature: f32,
    pub variations: usize,
    pub stagger: Duration,
    pub attempt_timeout: Option<Duration>,
    pub serialize_per_account: bool,
}

/// Video polling settings
#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - a variable has an unparseable value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret =
            var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database = match var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            None => None,
        };

        let gemini = match var("GEMINI_API_KEY") {
            Some(api_key) => {
                let defaults = GeminiConfig::default();
                Some(GeminiConfig {
                    api_key,
                    base_url: var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
                    enrichment_model: var("ENRICHMENT_MODEL").unwrap_or(defaults.enrichment_model),
                    image_model: var("IMAGE_MODEL").unwrap_or(defaults.image_model),
                    video_model: var("VIDEO_MODEL").unwrap_or(defaults.video_model),
                    request_timeout: defaults.request_timeout,
                })
            }
            None => None,
        };

        let attempt_timeout_secs: u64 = parse_or(&var, "ATTEMPT_TIMEOUT_SECS", 120)?;

        let variations: usize = parse_or(&var, "GENERATION_VARIATIONS", 3)?;
        if variations == 0 {
            anyhow::bail!("GENERATION_VARIATIONS must be at least 1");
        }

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&var, "API_PORT", 8080)?,
                cors_origins,
            },
            database,
            jwt: JwtConfig { secret: jwt_secret },
            admin_api_key: var("ADMIN_API_KEY"),
            gemini,
            generation: GenerationConfig {
                enrichment_temperature: parse_or(
                    &var,
                    "ENRICHMENT_TEMPERATURE",
                    DEFAULT_TEMPERATURE,
                )?,
                variations,
                stagger: Duration::from_millis(parse_or(&var, "GENERATION_STAGGER_MS", 300)?),
                attempt_timeout: (attempt_timeout_secs > 0)
                    .then(|| Duration::from_secs(attempt_timeout_secs)),
                serialize_per_account: parse_or(&var, "SERIALIZE_PER_ACCOUNT", true)?,
            },
            video: VideoSettings {
                poll_interval: Duration::from_secs(parse_or(&var, "VIDEO_POLL_INTERVAL_SECS", 3)?),
                max_polls: parse_or(&var, "VIDEO_MAX_POLLS", 100)?,
            },
            payment_latency: Duration::from_millis(parse_or(&var, "PAYMENT_LATENCY_MS", 2000)?),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True when no Gemini key is configured
    pub fn demo_mode(&self) -> bool {
        self.gemini.is_none()
    }

    /// Enrichment stage settings
    pub fn enrichment(&self) -> EnrichmentConfig {
        EnrichmentConfig {
            temperature: self.generation.enrichment_temperature,
            ..Default::default()
        }
    }

    /// Fan-out stage settings
    pub fn fan_out(&self) -> FanOutConfig {
        FanOutConfig {
            variations: self.generation.variations,
            stagger: self.generation.stagger,
            attempt_timeout: self.generation.attempt_timeout,
            ..Default::default()
        }
    }

    /// Orchestrator settings
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            serialize_per_account: self.generation.serialize_per_account,
        }
    }

    /// Video extender settings
    pub fn video_extender(&self) -> VideoConfig {
        VideoConfig {
            poll_interval: self.video.poll_interval,
            max_polls: self.video.max_polls,
            ..Default::default()
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
