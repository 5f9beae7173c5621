// ABOUTME: Authentication endpoints relaying signup, login, and logout to the provider
// ABOUTME: Exposes the current identity resolved from a bearer token

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Authentication endpoints.
//!
//! Credentials never touch local storage; they are forwarded to the auth
//! provider and the resulting session is returned verbatim.

use super::AppState;
use crate::auth::bearer_token;
use crate::errors::AppError;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Signup request body
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Email address
    pub email: String,
    /// Password, validated by the provider
    pub password: String,
    /// Optional display name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
}

/// Authentication routes
pub struct AuthRoutes;

impl AuthRoutes {
    /// Build the router for auth endpoints
    pub fn router() -> Router<Arc<AppState>> {
        Router::new()
            .route("/signup", post(Self::signup))
            .route("/login", post(Self::login))
            .route("/logout", post(Self::logout))
            .route("/me", get(Self::me))
    }

    /// Register a new account with the provider
    async fn signup(
        State(state): State<Arc<AppState>>,
        Json(request): Json<SignupRequest>,
    ) -> Result<Response, AppError> {
        if request.email.trim().is_empty() || !request.email.contains('@') {
            return Err(AppError::invalid_input("A valid email address is required"));
        }
        if request.password.is_empty() {
            return Err(AppError::invalid_input("Password must not be empty"));
        }

        let user = state
            .auth_client
            .signup(
                request.email.trim(),
                &request.password,
                request.display_name.as_deref(),
            )
            .await?;

        info!(user_id = %user.id, "user signed up");
        Ok((StatusCode::CREATED, Json(user)).into_response())
    }

    /// Exchange credentials for a session
    async fn login(
        State(state): State<Arc<AppState>>,
        Json(request): Json<LoginRequest>,
    ) -> Result<Response, AppError> {
        let session = state
            .auth_client
            .login(request.email.trim(), &request.password)
            .await?;

        // mirror the profile as soon as we hold a valid token
        if let Ok(user) = state.validator.validate(&session.access_token) {
            if let Err(e) = state.database.upsert_user_profile(&user).await {
                tracing::warn!(user_id = %user.id, error = %e, "failed to mirror user profile");
            }
            info!(user_id = %user.id, "user logged in");
        }

        Ok(Json(session).into_response())
    }

    /// Revoke the current session at the provider
    async fn logout(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let token = bearer_token(&headers)?;
        state.auth_client.logout(token).await?;
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Identity of the calling user, resolved from the bearer token
    async fn me(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        Ok(Json(user).into_response())
    }
}
