// ABOUTME: Deck file storage abstraction over local disk and S3-compatible backends
// ABOUTME: Defines the DeckStorage trait, deck id namespacing helpers, and the backend factory
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Deck storage backends.
//!
//! Bundled decks live at the root of the storage area; user decks live under
//! `users/<user_id>/`. User deck ids are namespaced as
//! `user_<8-char-prefix>_<slug>` so ownership survives a lost database row.

/// Local filesystem backend
pub mod local;

/// S3-compatible backend
pub mod s3;

use crate::config::environment::{StorageBackend, StorageConfig};
use crate::errors::AppError;
use crate::models::DeckDocument;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use local::LocalDeckStorage;
pub use s3::S3DeckStorage;

/// Failure in a storage backend operation
#[derive(Debug, Error)]
pub enum StorageError {
    /// Target file exists and overwrite was not requested
    #[error("deck file '{filename}' already exists")]
    AlreadyExists {
        /// The conflicting filename
        filename: String,
    },
    /// Local filesystem failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP transport failure talking to object storage
    #[error("object storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Object storage rejected the request
    #[error("object storage returned {status}: {message}")]
    Remote {
        /// HTTP status from the service
        status: u16,
        /// Response body excerpt
        message: String,
    },
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::AlreadyExists { ref filename } => {
                Self::already_exists(format!("Deck file '{filename}'"))
            }
            StorageError::Request(_) | StorageError::Remote { .. } => {
                Self::storage(error.to_string()).with_source(error)
            }
            StorageError::Io(_) => Self::storage(error.to_string()).with_source(error),
        }
    }
}

/// Storage interface for deck YAML documents.
///
/// All list operations tolerate individually unreadable files: such files
/// are logged and skipped rather than failing the whole listing.
#[async_trait]
pub trait DeckStorage: Send + Sync {
    /// List all bundled deck documents
    async fn list(&self) -> Result<Vec<DeckDocument>, StorageError>;

    /// Fetch a bundled deck by id (`.yaml` preferred over `.yml`)
    async fn get(&self, deck_id: &str) -> Result<Option<DeckDocument>, StorageError>;

    /// Save a bundled deck; refuses an existing filename unless `overwrite`
    async fn save(
        &self,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<DeckDocument, StorageError>;

    /// Delete a bundled deck, removing both `.yaml` and `.yml` candidates.
    /// Returns the filenames actually removed.
    async fn delete(&self, deck_id: &str) -> Result<Vec<String>, StorageError>;

    /// Whether a bundled deck with this id exists
    async fn exists(&self, deck_id: &str) -> Result<bool, StorageError>;

    /// List all deck documents owned by a user
    async fn list_user(&self, user_id: Uuid) -> Result<Vec<DeckDocument>, StorageError>;

    /// Fetch one of a user's decks by id
    async fn get_user(
        &self,
        user_id: Uuid,
        deck_id: &str,
    ) -> Result<Option<DeckDocument>, StorageError>;

    /// Save a deck into a user's storage area
    async fn save_user(
        &self,
        user_id: Uuid,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<DeckDocument, StorageError>;

    /// Delete one of a user's decks; returns removed filenames
    async fn delete_user(
        &self,
        user_id: Uuid,
        deck_id: &str,
    ) -> Result<Vec<String>, StorageError>;
}

/// Build the configured storage backend
pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Arc<dyn DeckStorage>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(
            LocalDeckStorage::new(config.decks_dir.clone()).await?,
        )),
        StorageBackend::S3 => Ok(Arc::new(S3DeckStorage::new(config)?)),
    }
}

/// Generate a namespaced deck id for a user-created deck.
///
/// Uses the first 8 characters of the hyphen-less user UUID for brevity.
#[must_use]
pub fn user_deck_id(user_id: Uuid, slug: &str) -> String {
    let compact = user_id.simple().to_string();
    format!("user_{}_{slug}", &compact[..8])
}

/// Whether a deck id belongs to a user-created deck
#[must_use]
pub fn is_user_deck(deck_id: &str) -> bool {
    deck_id.starts_with("user_")
}

/// Extract the 8-character owner prefix from a user deck id
#[must_use]
pub fn owner_prefix(deck_id: &str) -> Option<&str> {
    if !is_user_deck(deck_id) {
        return None;
    }
    let mut parts = deck_id.splitn(3, '_');
    parts.next(); // "user"
    match (parts.next(), parts.next()) {
        (Some(prefix), Some(_slug)) if !prefix.is_empty() => Some(prefix),
        _ => None,
    }
}

/// Whether a user id matches the owner prefix embedded in a deck id
#[must_use]
pub fn owner_prefix_matches(deck_id: &str, user_id: Uuid) -> bool {
    owner_prefix(deck_id)
        .is_some_and(|prefix| user_id.simple().to_string().starts_with(prefix))
}

/// Whether a filename carries a deck extension
#[must_use]
pub(crate) fn is_deck_filename(name: &str) -> bool {
    name.ends_with(".yaml") || name.ends_with(".yml")
}

/// Strip the deck extension from a filename
#[must_use]
pub(crate) fn filename_stem(name: &str) -> &str {
    name.strip_suffix(".yaml")
        .or_else(|| name.strip_suffix(".yml"))
        .unwrap_or(name)
}
