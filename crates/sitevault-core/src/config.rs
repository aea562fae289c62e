//! SiteVault Configuration Management
//!
//! Handles configuration from environment variables and TOML files.
//! Secrets and backend connection parameters have no usable defaults:
//! `validate` reports them missing so the server refuses to start.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Credential store connection
    pub database: DatabaseConfig,

    /// Hosted object storage
    pub storage: StorageConfig,

    /// Session token settings
    pub auth: AuthConfig,

    /// Media range proxy settings
    pub media: MediaConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Check that every required value is present.
    ///
    /// Returns the first missing key so startup can log it as fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("SITEVAULT_BACKEND_URL", self.storage.backend_url.as_str()),
            ("SITEVAULT_SERVICE_KEY", self.storage.service_key.as_str()),
            ("JWT_SECRET", self.auth.jwt_secret.as_str()),
            ("DATABASE_URL", self.database.url.as_str()),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingRequired(key.to_string()));
            }
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_TTL_SECS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.media.chunk_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MEDIA_CHUNK_BYTES".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(size) = parse_env("DATABASE_POOL_SIZE")? {
            self.database.pool_size = size;
        }

        // Storage
        if let Ok(url) = std::env::var("SITEVAULT_BACKEND_URL") {
            self.storage.backend_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(key) = std::env::var("SITEVAULT_SERVICE_KEY") {
            self.storage.service_key = key;
        }
        if let Ok(bucket) = std::env::var("STORAGE_BUCKET") {
            self.storage.bucket = bucket;
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }
        if let Some(ttl) = parse_env("JWT_TTL_SECS")? {
            self.auth.token_ttl_secs = ttl;
        }

        // Media
        if let Some(chunk) = parse_env("MEDIA_CHUNK_BYTES")? {
            self.media.chunk_bytes = chunk;
        }
        if let Some(ttl) = parse_env("MEDIA_SIGNED_URL_TTL_SECS")? {
            self.media.signed_url_ttl_secs = ttl;
        }
        if let Some(timeout) = parse_env("MEDIA_UPSTREAM_TIMEOUT_SECS")? {
            self.media.upstream_timeout_secs = timeout;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Empty by default - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Credential store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: 10,
        }
    }
}

/// Hosted object storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend base URL, without trailing slash
    pub backend_url: String,

    /// Service credential sent with signing requests
    pub service_key: String,

    /// Bucket holding project documents and media
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            service_key: String::new(),
            bucket: "documents".to_string(),
        }
    }
}

/// Session token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens
    pub jwt_secret: String,

    /// Token issuer identifier
    pub issuer: String,

    /// Token lifetime in seconds
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "sitevault".to_string(),
            token_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Media range proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Window served when the client sends no usable Range header
    pub chunk_bytes: u64,

    /// Lifetime of the signed retrieval URL
    pub signed_url_ttl_secs: u64,

    /// Deadline applied to each upstream call
    pub upstream_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 1024 * 1024,
            signed_url_ttl_secs: 60,
            upstream_timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
