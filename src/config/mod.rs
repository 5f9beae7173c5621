// ABOUTME: Configuration module grouping environment-based settings
// ABOUTME: Re-exports the server configuration types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Configuration management

/// Environment-variable driven server configuration
pub mod environment;

pub use environment::{
    AuthProviderConfig, DatabaseConfig, Environment, LogLevel, SecurityConfig, ServerConfig,
    StorageBackend, StorageConfig,
};
