// ABOUTME: Local filesystem storage backend for deck YAML documents
// ABOUTME: Reads and writes decks under a configured directory with per-user subdirectories
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Filesystem-based deck storage (the default backend).

use super::{filename_stem, is_deck_filename, DeckStorage, StorageError};
use crate::models::DeckDocument;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

/// Filesystem-based storage for decks
pub struct LocalDeckStorage {
    decks_dir: PathBuf,
}

impl LocalDeckStorage {
    /// Create the backend, ensuring the decks directory exists
    pub async fn new(decks_dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&decks_dir).await?;
        Ok(Self { decks_dir })
    }

    fn user_dir(&self, user_id: Uuid) -> PathBuf {
        self.decks_dir.join("users").join(user_id.to_string())
    }

    /// Locate a deck file by id, preferring `.yaml` over `.yml`
    async fn find_path(dir: &Path, deck_id: &str) -> Option<PathBuf> {
        for ext in ["yaml", "yml"] {
            let candidate = dir.join(format!("{deck_id}.{ext}"));
            if fs::try_exists(&candidate).await.unwrap_or(false) {
                return Some(candidate);
            }
        }
        None
    }

    async fn read_document(path: &Path) -> Result<DeckDocument, StorageError> {
        let content = fs::read_to_string(path).await?;
        let modified_time = fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(DeckDocument {
            id: filename_stem(&filename).to_string(),
            filename,
            content,
            modified_time,
        })
    }

    /// List all deck files in a directory, skipping unreadable entries
    async fn list_dir(dir: &Path) -> Result<Vec<DeckDocument>, StorageError> {
        let mut documents = Vec::new();
        if !fs::try_exists(dir).await.unwrap_or(false) {
            return Ok(documents);
        }
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_deck_filename(&name) {
                continue;
            }
            match Self::read_document(&entry.path()).await {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(filename = %name, error = %e, "skipping unreadable deck file");
                }
            }
        }
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    async fn save_in(
        dir: &Path,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<DeckDocument, StorageError> {
        fs::create_dir_all(dir).await?;
        let target = dir.join(filename);
        if !overwrite && fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists {
                filename: filename.to_string(),
            });
        }
        fs::write(&target, content.as_bytes()).await?;
        Ok(DeckDocument {
            id: filename_stem(filename).to_string(),
            filename: filename.to_string(),
            content: content.to_string(),
            modified_time: Some(Utc::now()),
        })
    }

    async fn delete_in(dir: &Path, deck_id: &str) -> Result<Vec<String>, StorageError> {
        let mut deleted = Vec::new();
        for ext in ["yaml", "yml"] {
            let candidate = dir.join(format!("{deck_id}.{ext}"));
            if fs::try_exists(&candidate).await.unwrap_or(false) {
                fs::remove_file(&candidate).await?;
                deleted.push(format!("{deck_id}.{ext}"));
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl DeckStorage for LocalDeckStorage {
    async fn list(&self) -> Result<Vec<DeckDocument>, StorageError> {
        Self::list_dir(&self.decks_dir).await
    }

    async fn get(&self, deck_id: &str) -> Result<Option<DeckDocument>, StorageError> {
        match Self::find_path(&self.decks_dir, deck_id).await {
            Some(path) => Ok(Some(Self::read_document(&path).await?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<DeckDocument, StorageError> {
        Self::save_in(&self.decks_dir, filename, content, overwrite).await
    }

    async fn delete(&self, deck_id: &str) -> Result<Vec<String>, StorageError> {
        Self::delete_in(&self.decks_dir, deck_id).await
    }

    async fn exists(&self, deck_id: &str) -> Result<bool, StorageError> {
        Ok(Self::find_path(&self.decks_dir, deck_id).await.is_some())
    }

    async fn list_user(&self, user_id: Uuid) -> Result<Vec<DeckDocument>, StorageError> {
        Self::list_dir(&self.user_dir(user_id)).await
    }

    async fn get_user(
        &self,
        user_id: Uuid,
        deck_id: &str,
    ) -> Result<Option<DeckDocument>, StorageError> {
        match Self::find_path(&self.user_dir(user_id), deck_id).await {
            Some(path) => Ok(Some(Self::read_document(&path).await?)),
            None => Ok(None),
        }
    }

    async fn save_user(
        &self,
        user_id: Uuid,
        filename: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<DeckDocument, StorageError> {
        Self::save_in(&self.user_dir(user_id), filename, content, overwrite).await
    }

    async fn delete_user(
        &self,
        user_id: Uuid,
        deck_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        Self::delete_in(&self.user_dir(user_id), deck_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DECK: &str = "id: t\ntitle: T\ncards: [{ id: a, question: q, answer: a }]\n";

    #[tokio::test]
    async fn test_save_list_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDeckStorage::new(dir.path().to_path_buf()).await.unwrap();

        storage.save("t.yaml", DECK, false).await.unwrap();
        assert!(storage.exists("t").await.unwrap());

        let listed = storage.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "t");
        assert!(listed[0].modified_time.is_some());

        let doc = storage.get("t").await.unwrap().unwrap();
        assert_eq!(doc.content, DECK);

        let deleted = storage.delete("t").await.unwrap();
        assert_eq!(deleted, vec!["t.yaml"]);
        assert!(!storage.exists("t").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_refuses_overwrite_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDeckStorage::new(dir.path().to_path_buf()).await.unwrap();

        storage.save("t.yaml", DECK, false).await.unwrap();
        let err = storage.save("t.yaml", "other", false).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        storage.save("t.yaml", "updated", true).await.unwrap();
        assert_eq!(storage.get("t").await.unwrap().unwrap().content, "updated");
    }

    #[tokio::test]
    async fn test_user_decks_are_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDeckStorage::new(dir.path().to_path_buf()).await.unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        storage.save_user(alice, "d.yaml", DECK, false).await.unwrap();

        assert_eq!(storage.list_user(alice).await.unwrap().len(), 1);
        assert!(storage.list_user(bob).await.unwrap().is_empty());
        assert!(storage.get_user(bob, "d").await.unwrap().is_none());
        // user decks never leak into the bundled listing
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_non_deck_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalDeckStorage::new(dir.path().to_path_buf()).await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "hi").await.unwrap();
        storage.save("t.yml", DECK, false).await.unwrap();

        let listed = storage.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, "t.yml");
    }
}
