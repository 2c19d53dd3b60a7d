//! Application configuration module
//!
//! Settings are layered: built-in defaults, then an optional config file, then
//! `ANALYZER__SECTION__KEY` environment variables, then the plain variables
//! (`HOST`, `PORT`, `DATABASE_URL`, `JWT_SECRET`, `ALLOWED_ORIGINS`) that
//! container platforms usually inject.

use crate::analysis::ImpactThresholds;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Development-only signing secret; main warns when it is still in use
pub const DEFAULT_JWT_SECRET: &str = "schema-analyzer-dev-secret-change-in-production";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Docker
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Which result store to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    #[serde(alias = "postgres")]
    Postgresql,
}

/// Result storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    pub database: DatabaseConfig,
    /// Reports (and metrics records) the memory backend keeps before dropping the oldest
    pub memory_capacity: usize,
    /// Upper bound on a single storage call made while serving a request
    pub operation_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            database: DatabaseConfig::default(),
            memory_capacity: 10_000,
            operation_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl StorageConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Database configuration for the PostgreSQL store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    pub require_tls: bool,
    /// Bounds TCP connect, pool checkout and connection recycling
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_pool_size: 10,
            require_tls: false,
            connect_timeout_secs: 5,
        }
    }
}

/// Authentication and request gatekeeping
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub api_user: String,
    /// bcrypt hash of the API user's password; token issuance is disabled without it
    pub api_password_hash: Option<String>,
    pub max_request_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            access_token_expire_minutes: 30,
            api_user: "analyzer".to_string(),
            api_password_hash: None,
            max_request_bytes: 10_000_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub thresholds: ImpactThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from the config file and environment
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let path = std::env::var("ANALYZER_CONFIG").unwrap_or_else(|_| "config/analyzer".to_string());

        let mut settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("ANALYZER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(host) = std::env::var("HOST").ok().and_then(|h| h.parse().ok()) {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            self.storage.database = parse_database_url(&database_url, self.storage.database.max_pool_size)?;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.security.jwt_secret = secret;
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }
        Ok(())
    }
}

/// Parse a DATABASE_URL connection string (postgresql://...)
pub fn parse_database_url(url: &str, max_pool_size: usize) -> Result<DatabaseConfig, ConfigError> {
    let parsed = url::Url::parse(url).map_err(|_| {
        ConfigError::InvalidValue("Invalid DATABASE_URL format (expected postgresql://...)".to_string())
    })?;

    if !matches!(parsed.scheme(), "postgres" | "postgresql") {
        return Err(ConfigError::InvalidValue(format!(
            "Unsupported DATABASE_URL scheme: {}",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
        .to_string();

    let database = parsed.path().trim_start_matches('/').to_string();
    if database.is_empty() {
        return Err(ConfigError::InvalidValue("Missing database name in DATABASE_URL".to_string()));
    }

    let require_tls = parsed
        .query_pairs()
        .any(|(k, v)| k == "sslmode" && v == "require");

    Ok(DatabaseConfig {
        host,
        port: parsed.port().unwrap_or(5432),
        user: parsed.username().to_string(),
        password: parsed.password().map(|p| p.to_string()).unwrap_or_default(),
        database,
        max_pool_size,
        require_tls,
        ..DatabaseConfig::default()
    })
}
