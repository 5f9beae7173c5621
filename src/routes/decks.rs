// ABOUTME: Deck catalog and CRUD endpoints over YAML deck documents
// ABOUTME: Enforces ownership and visibility, and logs authenticated downloads

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Deck endpoints.
//!
//! Listing and reading work anonymously for global content; creating,
//! updating, deleting, and downloading require authentication. User decks
//! get a namespaced id derived from the owner and the deck title, so two
//! users can both own a "Python Basics".

use super::AppState;
use crate::deck::{parse_deck, slugify};
use crate::errors::AppError;
use crate::models::{Deck, DeckMeta, DeckSource, UserDeckRecord, Visibility};
use crate::storage::{is_user_deck, user_deck_id};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Request body for creating a user deck
#[derive(Debug, Deserialize)]
pub struct CreateDeckRequest {
    /// Raw YAML deck document
    pub content: String,
    /// Visibility; defaults to private
    #[serde(default)]
    pub visibility: Visibility,
}

/// Request body for updating a user deck
#[derive(Debug, Deserialize)]
pub struct UpdateDeckRequest {
    /// Replacement YAML content, when changing the cards
    #[serde(default)]
    pub content: Option<String>,
    /// New visibility, when changing it
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// Full deck response: the parsed deck plus catalog context
#[derive(Debug, Serialize)]
pub struct DeckDetail {
    /// The parsed deck
    #[serde(flatten)]
    pub deck: Deck,
    /// Catalog context
    pub visibility: Visibility,
    /// Bundled or user-created
    pub source: DeckSource,
    /// Owner for user decks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<uuid::Uuid>,
}

/// Deck catalog and CRUD routes
pub struct DeckRoutes;

impl DeckRoutes {
    /// Build the router for deck endpoints
    pub fn router() -> Router<Arc<AppState>> {
        Router::new()
            .route("/", get(Self::list).post(Self::create))
            .route(
                "/:deck_id",
                get(Self::get_deck).put(Self::update).delete(Self::delete),
            )
            .route("/:deck_id/download", get(Self::download))
            .route("/:deck_id/pdf", get(Self::download_pdf))
    }

    /// List the catalog visible to the caller
    async fn list(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let viewer = state.optional_user(&headers).await?;
        let catalog = state.catalog.list(viewer.as_ref()).await?;
        Ok(Json(catalog).into_response())
    }

    /// Fetch one deck with all cards
    async fn get_deck(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let viewer = state.optional_user(&headers).await?;
        let (deck, resolved) = state.catalog.load_deck(&deck_id, viewer.as_ref()).await?;
        Ok(Json(DeckDetail {
            deck,
            visibility: resolved.visibility,
            source: resolved.source,
            owner_id: resolved.owner_id,
        })
        .into_response())
    }

    /// Create a user deck from uploaded YAML
    async fn create(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Json(request): Json<CreateDeckRequest>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;

        let mut deck =
            parse_deck(&request.content).map_err(|e| AppError::invalid_input(e.to_string()))?;

        let slug = slugify(&deck.title);
        if slug.is_empty() {
            return Err(AppError::invalid_input(
                "Deck title must contain at least one alphanumeric character",
            ));
        }
        let deck_id = user_deck_id(user.id, &slug);
        if state.catalog.id_taken(&deck_id).await? {
            return Err(AppError::already_exists(format!("Deck '{deck_id}'"))
                .with_resource_id(deck_id));
        }

        // the stored document carries the namespaced id, whatever the upload said
        deck.id.clone_from(&deck_id);
        let content = serde_yaml::to_string(&deck)?;
        let filename = format!("{deck_id}.yaml");

        let document = state
            .storage
            .save_user(user.id, &filename, &content, false)
            .await?;

        let now = Utc::now();
        state
            .database
            .insert_user_deck(&UserDeckRecord {
                deck_id: deck_id.clone(),
                owner_id: user.id,
                title: deck.title.clone(),
                visibility: request.visibility,
                filename,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(user_id = %user.id, deck_id = %deck_id, visibility = %request.visibility, "deck created");

        let meta = DeckMeta {
            id: deck_id,
            title: deck.title,
            description: deck.description,
            author: deck.author,
            language: deck.language,
            topics: deck.topics,
            card_count: deck.cards.len(),
            owner_id: Some(user.id),
            visibility: request.visibility,
            source: DeckSource::User,
            updated_at: document.modified_time,
        };
        Ok((StatusCode::CREATED, Json(meta)).into_response())
    }

    /// Update a user deck's content and/or visibility
    async fn update(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
        Json(request): Json<UpdateDeckRequest>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        if !is_user_deck(&deck_id) {
            return Err(AppError::permission_denied("Bundled decks cannot be modified")
                .with_resource_id(deck_id));
        }
        if request.content.is_none() && request.visibility.is_none() {
            return Err(AppError::invalid_input(
                "Update must change content or visibility",
            ));
        }

        let record = state
            .database
            .get_user_deck(&deck_id)
            .await?
            .ok_or_else(|| AppError::not_found("Deck").with_resource_id(&deck_id))?;
        if record.owner_id != user.id && !user.is_admin() {
            // hide other users' private decks entirely
            if record.visibility == Visibility::Private {
                return Err(AppError::not_found("Deck").with_resource_id(deck_id));
            }
            return Err(AppError::permission_denied("Only the owner can modify this deck")
                .with_resource_id(deck_id)
                .with_user_id(user.id));
        }

        let mut title = None;
        if let Some(content) = &request.content {
            let mut deck =
                parse_deck(content).map_err(|e| AppError::invalid_input(e.to_string()))?;
            deck.id.clone_from(&deck_id);
            let serialized = serde_yaml::to_string(&deck)?;
            state
                .storage
                .save_user(record.owner_id, &record.filename, &serialized, true)
                .await?;
            title = Some(deck.title);
        }

        state
            .database
            .update_user_deck(&deck_id, title.as_deref(), request.visibility)
            .await?;

        info!(user_id = %user.id, deck_id = %deck_id, "deck updated");

        let (deck, resolved) = state.catalog.load_deck(&deck_id, Some(&user)).await?;
        Ok(Json(DeckDetail {
            deck,
            visibility: request.visibility.unwrap_or(record.visibility),
            source: resolved.source,
            owner_id: resolved.owner_id,
        })
        .into_response())
    }

    /// Delete a user deck. Progress and session history are kept.
    async fn delete(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        if !is_user_deck(&deck_id) {
            return Err(AppError::permission_denied("Bundled decks cannot be deleted")
                .with_resource_id(deck_id));
        }

        let record = state
            .database
            .get_user_deck(&deck_id)
            .await?
            .ok_or_else(|| AppError::not_found("Deck").with_resource_id(&deck_id))?;
        if record.owner_id != user.id && !user.is_admin() {
            if record.visibility == Visibility::Private {
                return Err(AppError::not_found("Deck").with_resource_id(deck_id));
            }
            return Err(AppError::permission_denied("Only the owner can delete this deck")
                .with_resource_id(deck_id)
                .with_user_id(user.id));
        }

        let removed = state.storage.delete_user(record.owner_id, &deck_id).await?;
        if removed.is_empty() {
            warn!(deck_id = %deck_id, "deck record existed but no stored file was found");
        }
        state.database.delete_user_deck(&deck_id).await?;

        info!(user_id = %user.id, deck_id = %deck_id, "deck deleted");
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Download the raw YAML document. Requires authentication; every
    /// download is recorded.
    async fn download(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        let resolved = state.catalog.resolve(&deck_id, Some(&user)).await?;

        state
            .database
            .record_download(&user, &deck_id, &resolved.document.filename)
            .await?;
        info!(user_id = %user.id, deck_id = %deck_id, "deck downloaded");

        let disposition = format!("attachment; filename=\"{}\"", resolved.document.filename);
        Ok((
            [
                (header::CONTENT_TYPE, "application/x-yaml".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            resolved.document.content,
        )
            .into_response())
    }

    /// Download a printable worksheet PDF for the deck. Requires
    /// authentication; recorded like a YAML download.
    async fn download_pdf(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = state.require_user(&headers).await?;
        let (deck, _) = state.catalog.load_deck(&deck_id, Some(&user)).await?;

        let bytes = crate::pdf::deck_worksheet(&deck)?;
        let filename = format!("{deck_id}_worksheet.pdf");
        state
            .database
            .record_download(&user, &deck_id, &filename)
            .await?;
        info!(user_id = %user.id, deck_id = %deck_id, "worksheet downloaded");

        let disposition = format!("attachment; filename=\"{filename}\"");
        Ok((
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            bytes,
        )
            .into_response())
    }
}
