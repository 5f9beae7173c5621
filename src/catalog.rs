// ABOUTME: Catalog assembly merging bundled decks with user-created decks
// ABOUTME: Applies the visibility rule and resolves deck ids to stored documents
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! # Deck Catalog
//!
//! The catalog a caller sees is the bundled decks plus every user deck that
//! is either globally visible or owned by the caller. Malformed deck files
//! and dangling database records are logged and skipped from listings, but
//! surface as errors on direct access.

use crate::database::Database;
use crate::deck::{meta_from_document, parse_deck, DeckError};
use crate::errors::{AppError, ErrorCode};
use crate::models::{
    AuthenticatedUser, Deck, DeckDocument, DeckMeta, DeckSource, UserDeckRecord, Visibility,
};
use crate::storage::{is_user_deck, DeckStorage};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// A deck document resolved through the catalog, with its access context
#[derive(Debug, Clone)]
pub struct ResolvedDeck {
    /// The raw stored document
    pub document: DeckDocument,
    /// Owner for user decks, absent for bundled decks
    pub owner_id: Option<Uuid>,
    /// Effective visibility
    pub visibility: Visibility,
    /// Bundled or user-created
    pub source: DeckSource,
}

/// Merged view over bundled and user deck storage
#[derive(Clone)]
pub struct Catalog {
    storage: Arc<dyn DeckStorage>,
    database: Database,
}

impl Catalog {
    /// Create a catalog over the given storage backend and database
    #[must_use]
    pub fn new(storage: Arc<dyn DeckStorage>, database: Database) -> Self {
        Self { storage, database }
    }

    /// List all decks visible to the viewer: bundled decks first, then user
    /// decks that are global or owned by the viewer.
    pub async fn list(&self, viewer: Option<&AuthenticatedUser>) -> Result<Vec<DeckMeta>, AppError> {
        let mut catalog = Vec::new();

        for doc in self.storage.list().await? {
            match meta_from_document(&doc, DeckSource::Bundled, None, Visibility::Global) {
                Ok(meta) => catalog.push(meta),
                Err(e) => warn!(deck_id = %doc.id, error = %e, "skipping malformed bundled deck"),
            }
        }

        let records = self
            .database
            .list_visible_user_decks(viewer.map(|u| u.id))
            .await?;
        for record in records {
            match self.meta_for_record(&record).await {
                Ok(Some(meta)) => catalog.push(meta),
                Ok(None) => {
                    warn!(deck_id = %record.deck_id, "user deck record has no stored file, skipping");
                }
                Err(e) => warn!(deck_id = %record.deck_id, error = %e, "skipping malformed user deck"),
            }
        }

        Ok(catalog)
    }

    /// Build catalog metadata for one user deck record from its stored file
    async fn meta_for_record(
        &self,
        record: &UserDeckRecord,
    ) -> Result<Option<DeckMeta>, AppError> {
        let Some(doc) = self
            .storage
            .get_user(record.owner_id, &record.deck_id)
            .await?
        else {
            return Ok(None);
        };
        let meta = meta_from_document(
            &doc,
            DeckSource::User,
            Some(record.owner_id),
            record.visibility,
        )
        .map_err(deck_data_error(&record.deck_id))?;
        Ok(Some(meta))
    }

    /// Resolve a deck id to its stored document, enforcing visibility.
    ///
    /// Private decks of other users resolve to 404 rather than 403 so their
    /// existence is not revealed.
    pub async fn resolve(
        &self,
        deck_id: &str,
        viewer: Option<&AuthenticatedUser>,
    ) -> Result<ResolvedDeck, AppError> {
        if is_user_deck(deck_id) {
            let Some(record) = self.database.get_user_deck(deck_id).await? else {
                // no database row: the id prefix is the only ownership
                // evidence left, so only the matching owner may reach it
                return self.resolve_orphan(deck_id, viewer).await;
            };

            let viewer_id = viewer.map(|u| u.id);
            let is_admin = viewer.is_some_and(AuthenticatedUser::is_admin);
            let accessible = record.visibility == Visibility::Global
                || viewer_id == Some(record.owner_id)
                || is_admin;
            if !accessible {
                return Err(AppError::not_found("Deck").with_resource_id(deck_id));
            }

            let document = self
                .storage
                .get_user(record.owner_id, deck_id)
                .await?
                .ok_or_else(|| AppError::not_found("Deck").with_resource_id(deck_id))?;

            Ok(ResolvedDeck {
                document,
                owner_id: Some(record.owner_id),
                visibility: record.visibility,
                source: DeckSource::User,
            })
        } else {
            let document = self
                .storage
                .get(deck_id)
                .await?
                .ok_or_else(|| AppError::not_found("Deck").with_resource_id(deck_id))?;

            Ok(ResolvedDeck {
                document,
                owner_id: None,
                visibility: Visibility::Global,
                source: DeckSource::Bundled,
            })
        }
    }

    /// Resolve a user deck that has a stored file but no database record.
    /// Treated as private, owned by whoever matches the id prefix.
    async fn resolve_orphan(
        &self,
        deck_id: &str,
        viewer: Option<&AuthenticatedUser>,
    ) -> Result<ResolvedDeck, AppError> {
        let Some(viewer) = viewer else {
            return Err(AppError::not_found("Deck").with_resource_id(deck_id));
        };
        if !crate::storage::owner_prefix_matches(deck_id, viewer.id) {
            return Err(AppError::not_found("Deck").with_resource_id(deck_id));
        }
        let document = self
            .storage
            .get_user(viewer.id, deck_id)
            .await?
            .ok_or_else(|| AppError::not_found("Deck").with_resource_id(deck_id))?;
        warn!(deck_id, owner_id = %viewer.id, "user deck has no database record");
        Ok(ResolvedDeck {
            document,
            owner_id: Some(viewer.id),
            visibility: Visibility::Private,
            source: DeckSource::User,
        })
    }

    /// Resolve and parse a deck in one step
    pub async fn load_deck(
        &self,
        deck_id: &str,
        viewer: Option<&AuthenticatedUser>,
    ) -> Result<(Deck, ResolvedDeck), AppError> {
        let resolved = self.resolve(deck_id, viewer).await?;
        let deck = parse_deck(&resolved.document.content).map_err(deck_data_error(deck_id))?;
        Ok((deck, resolved))
    }

    /// Whether any deck (bundled or user) already uses this id
    pub async fn id_taken(&self, deck_id: &str) -> Result<bool, AppError> {
        if is_user_deck(deck_id) {
            Ok(self.database.get_user_deck(deck_id).await?.is_some())
        } else {
            Ok(self.storage.exists(deck_id).await?)
        }
    }
}

/// A stored deck that no longer parses is a data problem, not a client one
fn deck_data_error(deck_id: &str) -> impl FnOnce(DeckError) -> AppError + '_ {
    move |e| {
        AppError::new(
            ErrorCode::SerializationError,
            format!("Deck '{deck_id}' is malformed: {e}"),
        )
        .with_resource_id(deck_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::{user_deck_id, LocalDeckStorage};
    use chrono::Utc;

    fn deck_yaml(id: &str, title: &str) -> String {
        format!("id: {id}\ntitle: {title}\ncards: [{{ id: c1, question: q, answer: a }}]\n")
    }

    fn user(id: Uuid) -> AuthenticatedUser {
        AuthenticatedUser {
            id,
            email: None,
            display_name: None,
            roles: vec![],
        }
    }

    async fn test_catalog(dir: &std::path::Path) -> Catalog {
        let storage = Arc::new(LocalDeckStorage::new(dir.to_path_buf()).await.unwrap());
        let database = Database::new("sqlite::memory:").await.unwrap();
        Catalog::new(storage, database)
    }

    async fn add_user_deck(
        catalog: &Catalog,
        owner: Uuid,
        slug: &str,
        visibility: Visibility,
    ) -> String {
        let deck_id = user_deck_id(owner, slug);
        catalog
            .storage
            .save_user(owner, &format!("{deck_id}.yaml"), &deck_yaml(&deck_id, slug), false)
            .await
            .unwrap();
        let now = Utc::now();
        catalog
            .database
            .insert_user_deck(&UserDeckRecord {
                deck_id: deck_id.clone(),
                owner_id: owner,
                title: slug.to_string(),
                visibility,
                filename: format!("{deck_id}.yaml"),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        deck_id
    }

    #[tokio::test]
    async fn test_catalog_visibility_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = test_catalog(dir.path()).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        catalog
            .storage
            .save("bundled.yaml", &deck_yaml("bundled", "Bundled"), false)
            .await
            .unwrap();
        let alice_pub = add_user_deck(&catalog, alice, "pub", Visibility::Global).await;
        let alice_sec = add_user_deck(&catalog, alice, "sec", Visibility::Private).await;

        let anon: Vec<String> = catalog.list(None).await.unwrap().into_iter().map(|m| m.id).collect();
        assert!(anon.contains(&"bundled".to_string()));
        assert!(anon.contains(&alice_pub));
        assert!(!anon.contains(&alice_sec));

        let as_alice: Vec<String> = catalog
            .list(Some(&user(alice)))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert!(as_alice.contains(&alice_sec));

        let as_bob: Vec<String> = catalog
            .list(Some(&user(bob)))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert!(as_bob.contains(&alice_pub));
        assert!(!as_bob.contains(&alice_sec));
    }

    #[tokio::test]
    async fn test_private_deck_resolves_to_not_found_for_others() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = test_catalog(dir.path()).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let deck_id = add_user_deck(&catalog, alice, "sec", Visibility::Private).await;

        assert!(catalog.resolve(&deck_id, Some(&user(alice))).await.is_ok());

        let err = catalog.resolve(&deck_id, Some(&user(bob))).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        let err = catalog.resolve(&deck_id, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);

        // admins see everything
        let mut admin = user(bob);
        admin.roles.push("admin".into());
        assert!(catalog.resolve(&deck_id, Some(&admin)).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_bundled_deck_skipped_in_listing() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = test_catalog(dir.path()).await;

        catalog
            .storage
            .save("good.yaml", &deck_yaml("good", "Good"), false)
            .await
            .unwrap();
        catalog
            .storage
            .save("bad.yaml", "title: no cards here\n", false)
            .await
            .unwrap();

        let listed = catalog.list(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "good");

        // but direct access reports the data problem
        let err = catalog.load_deck("bad", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SerializationError);
    }

    #[tokio::test]
    async fn test_dangling_record_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = test_catalog(dir.path()).await;
        let alice = Uuid::new_v4();
        let now = Utc::now();

        // record without a stored file
        catalog
            .database
            .insert_user_deck(&UserDeckRecord {
                deck_id: user_deck_id(alice, "ghost"),
                owner_id: alice,
                title: "ghost".into(),
                visibility: Visibility::Global,
                filename: "ghost.yaml".into(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        assert!(catalog.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orphan_user_deck_falls_back_to_prefix_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = test_catalog(dir.path()).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        // stored file, no database record
        let deck_id = user_deck_id(alice, "orphan");
        catalog
            .storage
            .save_user(alice, &format!("{deck_id}.yaml"), &deck_yaml(&deck_id, "Orphan"), false)
            .await
            .unwrap();

        let resolved = catalog.resolve(&deck_id, Some(&user(alice))).await.unwrap();
        assert_eq!(resolved.visibility, Visibility::Private);
        assert_eq!(resolved.owner_id, Some(alice));

        assert!(catalog.resolve(&deck_id, Some(&user(bob))).await.is_err());
        assert!(catalog.resolve(&deck_id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_id_taken() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = test_catalog(dir.path()).await;
        let alice = Uuid::new_v4();

        catalog
            .storage
            .save("bundled.yaml", &deck_yaml("bundled", "Bundled"), false)
            .await
            .unwrap();
        let deck_id = add_user_deck(&catalog, alice, "mine", Visibility::Private).await;

        assert!(catalog.id_taken("bundled").await.unwrap());
        assert!(catalog.id_taken(&deck_id).await.unwrap());
        assert!(!catalog.id_taken("unused").await.unwrap());
    }
}
