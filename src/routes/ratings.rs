// ABOUTME: Deck rating endpoints: submit a star rating and read the aggregate
// ABOUTME: One rating per user per deck; re-rating replaces the previous value

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Rating endpoints, nested under `/api/decks/:deck_id/rating`.

use super::AppState;
use crate::errors::AppError;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Request body for rating a deck
#[derive(Debug, Deserialize)]
pub struct RateDeckRequest {
    /// Stars, 1 through 5
    pub stars: u8,
}

/// Aggregate rating response
#[derive(Debug, Serialize)]
pub struct RatingSummary {
    /// Deck id
    pub deck_id: String,
    /// Mean of all ratings, absent when unrated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    /// Number of ratings
    pub count: i64,
    /// The caller's own rating, when authenticated and rated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_rating: Option<u8>,
}

/// Deck rating routes
pub struct RatingRoutes;

impl RatingRoutes {
    /// Build the router for rating endpoints
    pub fn router() -> Router<Arc<AppState>> {
        Router::new().route("/:deck_id/rating", get(Self::summary).post(Self::rate))
    }

    /// Aggregate rating for a deck, plus the caller's own rating if any
    async fn summary(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let viewer = state.optional_user(&headers).await?;
        // resolving enforces visibility
        state.catalog.resolve(&deck_id, viewer.as_ref()).await?;

        let (average, count) = state.database.rating_summary(&deck_id).await?;
        let own_rating = match &viewer {
            Some(user) => state
                .database
                .get_user_rating(user.id, &deck_id)
                .await?
                .map(|r| r.stars),
            None => None,
        };

        Ok(Json(RatingSummary {
            deck_id,
            average,
            count,
            own_rating,
        })
        .into_response())
    }

    /// Submit or replace the caller's rating for a deck
    async fn rate(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
        Json(request): Json<RateDeckRequest>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        if !(1..=5).contains(&request.stars) {
            return Err(AppError::invalid_input("Rating must be between 1 and 5 stars"));
        }
        state.catalog.resolve(&deck_id, Some(&user)).await?;

        state
            .database
            .upsert_rating(user.id, &deck_id, request.stars)
            .await?;
        info!(user_id = %user.id, deck_id = %deck_id, stars = request.stars, "deck rated");

        let (average, count) = state.database.rating_summary(&deck_id).await?;
        Ok(Json(RatingSummary {
            deck_id,
            average,
            count,
            own_rating: Some(request.stars),
        })
        .into_response())
    }
}
