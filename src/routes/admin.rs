// ABOUTME: Admin-only endpoints for user, deck, and download oversight
// ABOUTME: Every route requires the admin role on the bearer token

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Admin endpoints. All of them return 403 for authenticated non-admins.

use super::AppState;
use crate::errors::AppError;
use crate::storage::is_user_deck;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const DEFAULT_DOWNLOAD_LIMIT: i64 = 100;
const MAX_DOWNLOAD_LIMIT: i64 = 1000;

/// Query parameters for the download listing
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Maximum records to return (default 100, capped at 1000)
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Admin routes
pub struct AdminRoutes;

impl AdminRoutes {
    /// Build the router for admin endpoints
    pub fn router() -> Router<Arc<AppState>> {
        Router::new()
            .route("/users", get(Self::list_users))
            .route("/decks", get(Self::list_decks))
            .route("/decks/:deck_id", axum::routing::delete(Self::delete_deck))
            .route("/downloads", get(Self::list_downloads))
    }

    /// All known user profiles
    async fn list_users(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        state.require_admin(&headers).await?;
        let users = state.database.list_user_profiles().await?;
        Ok(Json(users).into_response())
    }

    /// The full catalog including private decks of every user
    async fn list_decks(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let admin = state.require_admin(&headers).await?;
        let catalog = state.catalog.list(Some(&admin)).await?;
        // list() already includes everything global plus the admin's own;
        // add the remaining private decks of other users
        let ids: std::collections::HashSet<String> =
            catalog.iter().map(|m| m.id.clone()).collect();
        let mut full = catalog;
        for record in state.database.list_all_user_decks().await? {
            if ids.contains(&record.deck_id) {
                continue;
            }
            if let Some(doc) = state
                .storage
                .get_user(record.owner_id, &record.deck_id)
                .await?
            {
                if let Ok(meta) = crate::deck::meta_from_document(
                    &doc,
                    crate::models::DeckSource::User,
                    Some(record.owner_id),
                    record.visibility,
                ) {
                    full.push(meta);
                }
            }
        }
        Ok(Json(full).into_response())
    }

    /// Delete any deck: user decks including their database record, bundled
    /// decks directly from storage.
    async fn delete_deck(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let admin = state.require_admin(&headers).await?;

        let removed = if is_user_deck(&deck_id) {
            let record = state
                .database
                .get_user_deck(&deck_id)
                .await?
                .ok_or_else(|| AppError::not_found("Deck").with_resource_id(&deck_id))?;
            let removed = state.storage.delete_user(record.owner_id, &deck_id).await?;
            state.database.delete_user_deck(&deck_id).await?;
            removed
        } else {
            let removed = state.storage.delete(&deck_id).await?;
            if removed.is_empty() {
                return Err(AppError::not_found("Deck").with_resource_id(deck_id));
            }
            removed
        };

        info!(admin_id = %admin.id, deck_id = %deck_id, ?removed, "deck deleted by admin");
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Recent deck downloads
    async fn list_downloads(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Query(query): Query<DownloadQuery>,
    ) -> Result<Response, AppError> {
        state.require_admin(&headers).await?;
        let limit = query
            .limit
            .unwrap_or(DEFAULT_DOWNLOAD_LIMIT)
            .clamp(1, MAX_DOWNLOAD_LIMIT);
        let downloads = state.database.recent_downloads(limit).await?;
        Ok(Json(json!({ "downloads": downloads })).into_response())
    }
}
