// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into typed configuration for the Cardbox server
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Environment-based configuration management.
//!
//! Configuration is environment-only: every setting has either a default or
//! is required at startup, and [`ServerConfig::from_env`] is the single
//! entry point.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Default operational logging
    #[default]
    Info,
    /// Verbose debugging
    Debug,
    /// Full tracing
    Trace,
}

impl LogLevel {
    /// Convert to a `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Test runs
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL (`sqlite:cardbox.db`, `sqlite::memory:`)
    pub url: String,
}

/// Which deck storage backend to use
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem directory
    #[default]
    Local,
    /// S3-compatible object storage
    S3,
}

/// Deck storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    pub backend: StorageBackend,
    /// Local decks directory (local backend)
    pub decks_dir: PathBuf,
    /// Bucket name (s3 backend)
    pub s3_bucket: String,
    /// Key prefix inside the bucket, always ending in `/`
    pub s3_prefix: String,
    /// AWS region
    pub s3_region: String,
    /// Custom endpoint for S3-compatible services, path-style addressing
    pub s3_endpoint_url: Option<String>,
    /// Access key ID
    pub s3_access_key_id: String,
    /// Secret access key
    pub s3_secret_access_key: String,
}

/// Auth provider (GoTrue-style) relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    /// Base URL of the provider's auth API, without trailing slash
    pub base_url: String,
    /// Public API key sent with relay requests
    pub api_key: String,
    /// Shared secret for validating provider-issued HS256 JWTs
    pub jwt_secret: String,
    /// Expected `aud` claim
    pub audience: String,
}

/// Security-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins, or `["*"]` for any
    pub cors_origins: Vec<String>,
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Database settings
    pub database: DatabaseConfig,
    /// Deck storage settings
    pub storage: StorageConfig,
    /// Auth provider settings
    pub auth: AuthProviderConfig,
    /// Security settings
    pub security: SecurityConfig,
    /// Log level
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Reported application version
    pub app_version: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// `AUTH_JWT_SECRET` is required; everything else has a default suitable
    /// for local development. S3 credentials are required only when
    /// `DECK_STORAGE=s3`.
    pub fn from_env() -> Result<Self> {
        let storage_backend = match env_var_or("DECK_STORAGE", "local").to_lowercase().as_str() {
            "s3" => StorageBackend::S3,
            _ => StorageBackend::Local,
        };

        let storage = StorageConfig {
            backend: storage_backend.clone(),
            decks_dir: PathBuf::from(env_var_or("DECKS_DIR", "./decks")),
            s3_bucket: env_var_or("S3_BUCKET", ""),
            s3_prefix: normalize_prefix(&env_var_or("S3_PREFIX", "decks/")),
            s3_region: env_var_or("S3_REGION", "us-east-1"),
            s3_endpoint_url: env::var("S3_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
            s3_access_key_id: env_var_or("S3_ACCESS_KEY_ID", ""),
            s3_secret_access_key: env_var_or("S3_SECRET_ACCESS_KEY", ""),
        };

        if storage.backend == StorageBackend::S3 && storage.s3_bucket.is_empty() {
            anyhow::bail!("S3_BUCKET must be set when DECK_STORAGE=s3");
        }

        let config = Self {
            http_port: env_var_or("HTTP_PORT", "8081")
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env_var_or("DATABASE_URL", "sqlite:cardbox.db"),
            },
            storage,
            auth: AuthProviderConfig {
                base_url: env_var_or("AUTH_BASE_URL", "http://localhost:9999/auth/v1")
                    .trim_end_matches('/')
                    .to_string(),
                api_key: env_var_or("AUTH_API_KEY", ""),
                jwt_secret: env::var("AUTH_JWT_SECRET")
                    .context("AUTH_JWT_SECRET environment variable is required")?,
                audience: env_var_or("AUTH_AUDIENCE", "authenticated"),
            },
            security: SecurityConfig {
                cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")),
            },
            log_level: LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info")),
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            app_version: env_var_or("APP_VERSION", env!("CARGO_PKG_VERSION")),
        };

        Ok(config)
    }

    /// Get a summary of the configuration for startup logging (no secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        let storage = match self.storage.backend {
            StorageBackend::Local => format!("local:{}", self.storage.decks_dir.display()),
            StorageBackend::S3 => format!(
                "s3:{}/{}",
                self.storage.s3_bucket, self.storage.s3_prefix
            ),
        };
        format!(
            "port={} env={} log={} storage={} db={} auth={}",
            self.http_port,
            self.environment,
            self.log_level,
            storage,
            self.database.url,
            self.auth.base_url
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Ensure a non-empty storage prefix ends with exactly one slash
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str == "*" {
        vec!["*".to_string()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str_or_default("error"), LogLevel::Error);
        assert_eq!(LogLevel::from_str_or_default("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::from_str_or_default("Debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("invalid"), LogLevel::Info);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_str_or_default("production"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default("PROD"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default("anything"),
            Environment::Development
        );
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("http://localhost:3000, https://app.example.com"),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("decks"), "decks/");
        assert_eq!(normalize_prefix("decks///"), "decks/");
        assert_eq!(normalize_prefix("a/b"), "a/b/");
        assert_eq!(normalize_prefix(""), "");
    }
}
