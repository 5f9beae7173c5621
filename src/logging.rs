// ABOUTME: Logging configuration and structured logging setup for observability
// ABOUTME: Configures tracing subscriber with env-filter and JSON or pretty output
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Structured logging setup.
//!
//! Output format defaults to pretty in development and JSON in production;
//! `LOG_FORMAT` overrides, `RUST_LOG` wins over `LOG_LEVEL` for filtering.

use crate::config::environment::{Environment, LogLevel};
use anyhow::Result;
use std::env;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for production logging
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    /// Parse from string with environment-dependent fallback
    #[must_use]
    pub fn from_str_or_default(s: &str, environment: &Environment) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ if environment.is_production() => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize logging from environment variables.
///
/// Called once at startup; returns an error if a subscriber is already
/// installed.
pub fn init_from_env(level: &LogLevel, environment: &Environment) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cardbox={level},tower_http=info")));

    let format = LogFormat::from_str_or_default(
        &env::var("LOG_FORMAT").unwrap_or_default(),
        environment,
    );

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    Ok(())
}
