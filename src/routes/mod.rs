// ABOUTME: HTTP route modules and shared application state
// ABOUTME: Assembles the axum router with CORS and request tracing

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! # HTTP Routes
//!
//! Each resource gets its own module with a `Routes` struct exposing a
//! `router()`. Handlers take `State<Arc<AppState>>` and return
//! `Result<Response, AppError>` so every failure goes through the standard
//! error envelope.

/// Admin-only endpoints
pub mod admin;
/// Signup, login, logout, and identity
pub mod auth;
/// Deck catalog and CRUD
pub mod decks;
/// Liveness, readiness, and version
pub mod health;
/// Study progress endpoints
pub mod progress;
/// Deck rating endpoints
pub mod ratings;
/// Quiz delivery and answer checking
pub mod quiz;

use crate::auth::{bearer_token, AuthProviderClient, TokenValidator};
use crate::catalog::Catalog;
use crate::config::environment::ServerConfig;
use crate::database::Database;
use crate::errors::AppError;
use crate::models::AuthenticatedUser;
use crate::progress::ProgressTracker;
use crate::storage::DeckStorage;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared state available to every handler
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Database handle
    pub database: Database,
    /// Deck file storage
    pub storage: Arc<dyn DeckStorage>,
    /// Merged deck catalog
    pub catalog: Catalog,
    /// Progress tracker
    pub progress: ProgressTracker,
    /// Relay client for the auth provider
    pub auth_client: AuthProviderClient,
    /// Local JWT validator
    pub validator: TokenValidator,
}

impl AppState {
    /// Wire up application state from its components
    #[must_use]
    pub fn new(
        config: ServerConfig,
        database: Database,
        storage: Arc<dyn DeckStorage>,
    ) -> Result<Self, AppError> {
        let catalog = Catalog::new(Arc::clone(&storage), database.clone());
        let progress = ProgressTracker::new(database.clone());
        let auth_client = AuthProviderClient::new(&config.auth)?;
        let validator = TokenValidator::new(&config.auth);
        Ok(Self {
            config,
            database,
            storage,
            catalog,
            progress,
            auth_client,
            validator,
        })
    }

    /// Authenticate the request, mirroring the user into the profile table
    pub async fn require_user(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AppError> {
        let token = bearer_token(headers)?;
        let user = self.validator.validate(token)?;
        // keep the local profile mirror fresh; a failure here must not block
        // the request
        if let Err(e) = self.database.upsert_user_profile(&user).await {
            warn!(user_id = %user.id, error = %e, "failed to mirror user profile");
        }
        Ok(user)
    }

    /// Authenticate when credentials are present.
    ///
    /// No `Authorization` header yields `None`; a present but invalid token
    /// is still an error so clients notice expired sessions.
    pub async fn optional_user(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<AuthenticatedUser>, AppError> {
        if !headers.contains_key(header::AUTHORIZATION) {
            return Ok(None);
        }
        self.require_user(headers).await.map(Some)
    }

    /// Authenticate and require the admin role
    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AppError> {
        let user = self.require_user(headers).await?;
        if !user.is_admin() {
            return Err(AppError::permission_denied("Admin role required").with_user_id(user.id));
        }
        Ok(user)
    }
}

/// Build the complete application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        .merge(health::HealthRoutes::router())
        .nest("/api/auth", auth::AuthRoutes::router())
        .nest(
            "/api/decks",
            decks::DeckRoutes::router().merge(ratings::RatingRoutes::router()),
        )
        .nest("/api/progress", progress::ProgressRoutes::router())
        .nest("/api/quiz", quiz::QuizRoutes::router())
        .nest("/api/admin", admin::AdminRoutes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer from the configured origin list; `*` allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        base.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        base.allow_origin(AllowOrigin::list(parsed))
    }
}
