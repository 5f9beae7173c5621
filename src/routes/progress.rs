// ABOUTME: Study progress endpoints for saving, reading, and resetting deck progress
// ABOUTME: All progress is scoped to the authenticated user

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Progress endpoints. Every route requires authentication; a user can only
//! ever see and change their own progress.

use super::AppState;
use crate::errors::AppError;
use crate::progress::ProgressUpdate;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Progress routes
pub struct ProgressRoutes;

impl ProgressRoutes {
    /// Build the router for progress endpoints
    pub fn router() -> Router<Arc<AppState>> {
        Router::new()
            .route("/", get(Self::overview))
            .route(
                "/:deck_id",
                get(Self::report).post(Self::save).delete(Self::reset),
            )
    }

    /// Deck ids the caller has progress in
    async fn overview(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        let deck_ids = state.progress.decks_with_progress(&user).await?;
        Ok(Json(json!({ "deck_ids": deck_ids })).into_response())
    }

    /// Full progress report for one deck
    async fn report(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        let report = state.progress.report(&user, &deck_id).await?;
        Ok(Json(report).into_response())
    }

    /// Save a progress update, optionally with a session summary.
    ///
    /// The deck must be visible to the caller; the title recorded with the
    /// session comes from the deck file.
    async fn save(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
        Json(update): Json<ProgressUpdate>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        let (deck, _) = state.catalog.load_deck(&deck_id, Some(&user)).await?;
        let outcome = state
            .progress
            .save(&user, &deck_id, update, Some(&deck.title))
            .await?;
        Ok(Json(outcome).into_response())
    }

    /// Reset progress for one deck. Session history survives the reset.
    async fn reset(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        let deleted = state.progress.reset(&user, &deck_id).await?;
        Ok(Json(json!({ "deleted": deleted })).into_response())
    }
}
