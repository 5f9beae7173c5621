// ABOUTME: Liveness, readiness, and version endpoints
// ABOUTME: Readiness checks database connectivity before reporting ready

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Health and version endpoints, unauthenticated.

use super::AppState;
use crate::errors::AppError;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Health and version routes
pub struct HealthRoutes;

impl HealthRoutes {
    /// Build the router for health endpoints
    pub fn router() -> Router<Arc<AppState>> {
        Router::new()
            .route("/health", get(Self::health))
            .route("/health/ready", get(Self::ready))
            .route("/api/version", get(Self::version))
    }

    /// Liveness probe
    async fn health() -> Response {
        Json(json!({ "status": "ok" })).into_response()
    }

    /// Readiness probe: the service is ready once the database answers
    async fn ready(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
        if let Err(e) = state.database.ping().await {
            return Err(AppError::database(format!("database not reachable: {e}")));
        }
        Ok(Json(json!({ "status": "ready" })).into_response())
    }

    /// Version and environment report
    async fn version(State(state): State<Arc<AppState>>) -> Response {
        Json(json!({
            "version": &state.config.app_version,
            "environment": state.config.environment.to_string(),
        }))
        .into_response()
    }
}
