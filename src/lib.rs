// ABOUTME: Main library entry point for the Cardbox flashcard learning backend
// ABOUTME: Exposes REST API, YAML deck storage, delegated auth, and progress tracking
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

#![deny(unsafe_code)]

//! # Cardbox
//!
//! Backend service for a flashcard learning application. Decks are YAML
//! documents stored on local disk or in an S3-compatible bucket; user
//! accounts live in a third-party auth provider whose tokens this service
//! validates locally. Per-user learning progress uses a three-box Leitner
//! scheme persisted in SQLite.
//!
//! ## Architecture
//!
//! - **Storage**: [`storage::DeckStorage`] abstracts the deck file backend
//! - **Catalog**: [`catalog`] merges bundled decks with user decks under
//!   visibility rules
//! - **Auth**: [`auth`] relays signup/login/logout to the provider and
//!   validates its JWTs
//! - **Routes**: [`routes`] exposes the JSON REST API over axum
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cardbox::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("cardbox configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Auth provider relay client and JWT validation
pub mod auth;

/// Merged deck catalog with visibility rules
pub mod catalog;

/// Environment-based configuration
pub mod config;

/// Database access layer (SQLite via sqlx)
pub mod database;

/// YAML deck parsing and validation
pub mod deck;

/// Unified error handling
pub mod errors;

/// Structured logging setup
pub mod logging;

/// Common data structures
pub mod models;

/// PDF worksheet rendering
pub mod pdf;

/// Leitner-box progress tracking
pub mod progress;

/// REST API routes
pub mod routes;

/// Deck file storage backends
pub mod storage;

pub use errors::{AppError, AppResult};
