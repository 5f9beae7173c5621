// ABOUTME: Database access layer for user profiles, deck records, progress, ratings, and downloads
// ABOUTME: SQLite via sqlx with inline migrations and manual row mapping
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! # Database Management
//!
//! SQLite persistence for everything that is not a deck file: mirrored user
//! profiles, user-deck visibility records, Leitner-box card progress, study
//! sessions, deck ratings, and the download log. Migrations are inline
//! `CREATE TABLE IF NOT EXISTS` statements run at startup.

use crate::models::{
    AuthenticatedUser, BoxDistribution, CardProgress, DeckRating, DownloadRecord, SessionSummary,
    UserDeckRecord, UserProfile, Visibility,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Database manager for Cardbox persistence
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run migrations
    pub async fn new(database_url: &str) -> Result<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_string()
        };

        // an in-memory database exists per connection, so the pool must not
        // grow past one
        let pool = if database_url.contains(":memory:") {
            sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&connection_options)
                .await
        } else {
            SqlitePool::connect(&connection_options).await
        }
        .with_context(|| format!("failed to open database at {database_url}"))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_profiles (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                display_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_decks (
                deck_id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                title TEXT NOT NULL,
                visibility TEXT NOT NULL DEFAULT 'private',
                filename TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_decks_owner ON user_decks(owner_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS card_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                deck_id TEXT NOT NULL,
                card_id TEXT NOT NULL,
                box INTEGER NOT NULL CHECK (box IN (1, 2, 3)),
                last_reviewed TEXT NOT NULL,
                review_count INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                UNIQUE (user_id, deck_id, card_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_card_progress_user_deck ON card_progress(user_id, deck_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS study_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                deck_id TEXT NOT NULL,
                deck_title TEXT,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                cards_reviewed INTEGER NOT NULL,
                box1_count INTEGER NOT NULL DEFAULT 0,
                box2_count INTEGER NOT NULL DEFAULT 0,
                box3_count INTEGER NOT NULL DEFAULT 0,
                duration_seconds INTEGER,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_study_sessions_user_deck ON study_sessions(user_id, deck_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS deck_ratings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                deck_id TEXT NOT NULL,
                stars INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
                rated_at TEXT NOT NULL,
                UNIQUE (user_id, deck_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS download_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                user_email TEXT,
                deck_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                downloaded_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Readiness probe
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ========================================================================
    // User profiles
    // ========================================================================

    /// Mirror an authenticated user into the local profile table
    pub async fn upsert_user_profile(&self, user: &AuthenticatedUser) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r"
            INSERT INTO user_profiles (id, email, display_name, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (id) DO UPDATE SET
                email = excluded.email,
                display_name = COALESCE(excluded.display_name, user_profiles.display_name),
                updated_at = ?4
            ",
        )
        .bind(user.id.to_string())
        .bind(user.email.clone().unwrap_or_default())
        .bind(user.display_name.clone())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a user profile by ID
    pub async fn get_user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM user_profiles WHERE id = ?1")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_profile(&r)).transpose()
    }

    /// List all known user profiles, newest first
    pub async fn list_user_profiles(&self) -> Result<Vec<UserProfile>> {
        let rows = sqlx::query("SELECT * FROM user_profiles ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_profile).collect()
    }

    fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile> {
        Ok(UserProfile {
            id: parse_uuid(&row.try_get::<String, _>("id")?)?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
            updated_at: row
                .try_get::<Option<String>, _>("updated_at")?
                .as_deref()
                .map(parse_ts)
                .transpose()?,
        })
    }

    // ========================================================================
    // User deck records
    // ========================================================================

    /// Insert a record for a newly created user deck
    pub async fn insert_user_deck(&self, record: &UserDeckRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO user_decks (deck_id, owner_id, title, visibility, filename, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(&record.deck_id)
        .bind(record.owner_id.to_string())
        .bind(&record.title)
        .bind(record.visibility.as_str())
        .bind(&record.filename)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a user deck record by deck ID
    pub async fn get_user_deck(&self, deck_id: &str) -> Result<Option<UserDeckRecord>> {
        let row = sqlx::query("SELECT * FROM user_decks WHERE deck_id = ?1")
            .bind(deck_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_deck_record(&r)).transpose()
    }

    /// Update title and/or visibility of a user deck record
    pub async fn update_user_deck(
        &self,
        deck_id: &str,
        title: Option<&str>,
        visibility: Option<Visibility>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE user_decks SET
                title = COALESCE(?2, title),
                visibility = COALESCE(?3, visibility),
                updated_at = ?4
            WHERE deck_id = ?1
            ",
        )
        .bind(deck_id)
        .bind(title)
        .bind(visibility.map(Visibility::as_str))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a user deck record
    pub async fn delete_user_deck(&self, deck_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_decks WHERE deck_id = ?1")
            .bind(deck_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List all decks owned by a user
    pub async fn list_decks_by_owner(&self, owner_id: Uuid) -> Result<Vec<UserDeckRecord>> {
        let rows = sqlx::query("SELECT * FROM user_decks WHERE owner_id = ?1 ORDER BY deck_id")
            .bind(owner_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_deck_record).collect()
    }

    /// List every user deck record regardless of visibility
    pub async fn list_all_user_decks(&self) -> Result<Vec<UserDeckRecord>> {
        let rows = sqlx::query("SELECT * FROM user_decks ORDER BY deck_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_deck_record).collect()
    }

    /// List user decks visible to a viewer: global decks plus the viewer's own
    pub async fn list_visible_user_decks(
        &self,
        viewer: Option<Uuid>,
    ) -> Result<Vec<UserDeckRecord>> {
        let rows = match viewer {
            Some(viewer) => {
                sqlx::query(
                    "SELECT * FROM user_decks WHERE visibility = 'global' OR owner_id = ?1 ORDER BY deck_id",
                )
                .bind(viewer.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM user_decks WHERE visibility = 'global' ORDER BY deck_id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(Self::row_to_deck_record).collect()
    }

    fn row_to_deck_record(row: &sqlx::sqlite::SqliteRow) -> Result<UserDeckRecord> {
        Ok(UserDeckRecord {
            deck_id: row.try_get("deck_id")?,
            owner_id: parse_uuid(&row.try_get::<String, _>("owner_id")?)?,
            title: row.try_get("title")?,
            visibility: Visibility::from_str_or_private(
                &row.try_get::<String, _>("visibility")?,
            ),
            filename: row.try_get("filename")?,
            created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
        })
    }

    // ========================================================================
    // Card progress & study sessions
    // ========================================================================

    /// Persist a progress update atomically.
    ///
    /// Each card is upserted; on conflict the stored review count is
    /// incremented rather than replaced, so repeated reviews accumulate. An
    /// optional session summary is appended to the history.
    pub async fn save_progress(
        &self,
        user_id: Uuid,
        deck_id: &str,
        cards: &[(String, CardProgress)],
        session: Option<&SessionSummary>,
        deck_title: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for (card_id, progress) in cards {
            sqlx::query(
                r"
                INSERT INTO card_progress
                    (user_id, deck_id, card_id, box, last_reviewed, review_count, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                ON CONFLICT (user_id, deck_id, card_id) DO UPDATE SET
                    box = excluded.box,
                    last_reviewed = excluded.last_reviewed,
                    review_count = card_progress.review_count + 1,
                    updated_at = ?7
                ",
            )
            .bind(user_id.to_string())
            .bind(deck_id)
            .bind(card_id)
            .bind(i64::from(progress.box_number))
            .bind(progress.last_reviewed.to_rfc3339())
            .bind(progress.review_count.max(1))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(summary) = session {
            let completed_at = summary.completed_at;
            let started_at = summary.started_at.unwrap_or_else(|| {
                // Derive the start from the duration when the client omits it
                summary
                    .duration_seconds
                    .map_or(completed_at, |secs| {
                        completed_at - chrono::Duration::seconds(secs)
                    })
            });

            sqlx::query(
                r"
                INSERT INTO study_sessions
                    (user_id, deck_id, deck_title, started_at, completed_at,
                     cards_reviewed, box1_count, box2_count, box3_count, duration_seconds, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ",
            )
            .bind(user_id.to_string())
            .bind(deck_id)
            .bind(deck_title)
            .bind(started_at.to_rfc3339())
            .bind(completed_at.to_rfc3339())
            .bind(summary.cards_reviewed)
            .bind(summary.box_distribution.box1)
            .bind(summary.box_distribution.box2)
            .bind(summary.box_distribution.box3)
            .bind(summary.duration_seconds)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load all card progress for a user and deck.
    ///
    /// Returns `(card_id, progress, updated_at)` tuples; `updated_at` feeds
    /// the report's `last_updated`.
    pub async fn load_card_progress(
        &self,
        user_id: Uuid,
        deck_id: &str,
    ) -> Result<Vec<(String, CardProgress, Option<DateTime<Utc>>)>> {
        let rows = sqlx::query(
            r"
            SELECT card_id, box, last_reviewed, review_count, created_at, updated_at
            FROM card_progress
            WHERE user_id = ?1 AND deck_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(deck_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let progress = CardProgress {
                    box_number: u8::try_from(row.try_get::<i64, _>("box")?).unwrap_or(3),
                    last_reviewed: parse_ts(&row.try_get::<String, _>("last_reviewed")?)?,
                    review_count: row.try_get("review_count")?,
                };
                let updated_at = row
                    .try_get::<Option<String>, _>("updated_at")?
                    .or(Some(row.try_get::<String, _>("created_at")?))
                    .as_deref()
                    .map(parse_ts)
                    .transpose()?;
                Ok((row.try_get("card_id")?, progress, updated_at))
            })
            .collect()
    }

    /// Delete card progress for a user and deck. Session history is kept as
    /// a historical record.
    pub async fn delete_card_progress(&self, user_id: Uuid, deck_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM card_progress WHERE user_id = ?1 AND deck_id = ?2")
            .bind(user_id.to_string())
            .bind(deck_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Deck IDs the user has progress in
    pub async fn deck_ids_with_progress(&self, user_id: Uuid) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT deck_id FROM card_progress WHERE user_id = ?1 ORDER BY deck_id",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("deck_id")?))
            .collect()
    }

    /// Most recent study sessions for a user and deck, newest first
    pub async fn session_history(
        &self,
        user_id: Uuid,
        deck_id: &str,
        limit: i64,
    ) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            r"
            SELECT id, started_at, completed_at, cards_reviewed,
                   box1_count, box2_count, box3_count, duration_seconds
            FROM study_sessions
            WHERE user_id = ?1 AND deck_id = ?2
            ORDER BY completed_at DESC
            LIMIT ?3
            ",
        )
        .bind(user_id.to_string())
        .bind(deck_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SessionSummary {
                    session_id: Some(format!("sess_{}", row.try_get::<i64, _>("id")?)),
                    started_at: Some(parse_ts(&row.try_get::<String, _>("started_at")?)?),
                    completed_at: parse_ts(&row.try_get::<String, _>("completed_at")?)?,
                    cards_reviewed: row.try_get("cards_reviewed")?,
                    box_distribution: BoxDistribution {
                        box1: row.try_get("box1_count")?,
                        box2: row.try_get("box2_count")?,
                        box3: row.try_get("box3_count")?,
                    },
                    duration_seconds: row.try_get("duration_seconds")?,
                })
            })
            .collect()
    }

    // ========================================================================
    // Deck ratings
    // ========================================================================

    /// Insert or replace a user's rating of a deck
    pub async fn upsert_rating(&self, user_id: Uuid, deck_id: &str, stars: u8) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO deck_ratings (user_id, deck_id, stars, rated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id, deck_id) DO UPDATE SET
                stars = excluded.stars,
                rated_at = excluded.rated_at
            ",
        )
        .bind(user_id.to_string())
        .bind(deck_id)
        .bind(i64::from(stars))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Average rating and rating count for a deck
    pub async fn rating_summary(&self, deck_id: &str) -> Result<(Option<f64>, i64)> {
        let row = sqlx::query(
            "SELECT AVG(stars) AS average, COUNT(*) AS count FROM deck_ratings WHERE deck_id = ?1",
        )
        .bind(deck_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.try_get("average")?, row.try_get("count")?))
    }

    /// A user's own rating of a deck, if any
    pub async fn get_user_rating(&self, user_id: Uuid, deck_id: &str) -> Result<Option<DeckRating>> {
        let row = sqlx::query(
            "SELECT stars, rated_at FROM deck_ratings WHERE user_id = ?1 AND deck_id = ?2",
        )
        .bind(user_id.to_string())
        .bind(deck_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(DeckRating {
                deck_id: deck_id.to_string(),
                user_id,
                stars: u8::try_from(r.try_get::<i64, _>("stars")?).unwrap_or(0),
                rated_at: parse_ts(&r.try_get::<String, _>("rated_at")?)?,
            })
        })
        .transpose()
    }

    // ========================================================================
    // Download log
    // ========================================================================

    /// Record a deck download by an authenticated user
    pub async fn record_download(
        &self,
        user: &AuthenticatedUser,
        deck_id: &str,
        filename: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO download_logs (user_id, user_email, deck_id, filename, downloaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(user.id.to_string())
        .bind(user.email.clone())
        .bind(deck_id)
        .bind(filename)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent download records, newest first
    pub async fn recent_downloads(&self, limit: i64) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM download_logs ORDER BY downloaded_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(DownloadRecord {
                    user_id: parse_uuid(&row.try_get::<String, _>("user_id")?)?,
                    user_email: row.try_get("user_email")?,
                    deck_id: row.try_get("deck_id")?,
                    filename: row.try_get("filename")?,
                    downloaded_at: parse_ts(&row.try_get::<String, _>("downloaded_at")?)?,
                })
            })
            .collect()
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp in database: {s}"))?
        .with_timezone(&Utc))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("invalid UUID in database: {s}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    fn test_user(id: Uuid) -> AuthenticatedUser {
        AuthenticatedUser {
            id,
            email: Some("user@example.com".into()),
            display_name: Some("Test User".into()),
            roles: vec![],
        }
    }

    #[tokio::test]
    async fn test_profile_upsert_preserves_created_at() {
        let db = test_db().await;
        let user = test_user(Uuid::new_v4());

        db.upsert_user_profile(&user).await.unwrap();
        let first = db.get_user_profile(user.id).await.unwrap().unwrap();
        assert!(first.updated_at.is_none());

        db.upsert_user_profile(&user).await.unwrap();
        let second = db.get_user_profile(user.id).await.unwrap().unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_review_count_increments_on_conflict() {
        let db = test_db().await;
        let user = Uuid::new_v4();
        let progress = CardProgress {
            box_number: 2,
            last_reviewed: Utc::now(),
            review_count: 1,
        };

        db.save_progress(user, "deck1", &[("c1".into(), progress.clone())], None, None)
            .await
            .unwrap();
        db.save_progress(user, "deck1", &[("c1".into(), progress)], None, None)
            .await
            .unwrap();

        let loaded = db.load_card_progress(user, "deck1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1.review_count, 2);
        assert_eq!(loaded[0].1.box_number, 2);
    }

    #[tokio::test]
    async fn test_delete_progress_keeps_sessions() {
        let db = test_db().await;
        let user = Uuid::new_v4();
        let progress = CardProgress {
            box_number: 1,
            last_reviewed: Utc::now(),
            review_count: 1,
        };
        let session = SessionSummary {
            session_id: None,
            started_at: None,
            completed_at: Utc::now(),
            cards_reviewed: 5,
            box_distribution: BoxDistribution { box1: 3, box2: 1, box3: 1 },
            duration_seconds: Some(120),
        };

        db.save_progress(
            user,
            "deck1",
            &[("c1".into(), progress)],
            Some(&session),
            Some("Deck One"),
        )
        .await
        .unwrap();

        let deleted = db.delete_card_progress(user, "deck1").await.unwrap();
        assert_eq!(deleted, 1);

        let history = db.session_history(user, "deck1", 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].cards_reviewed, 5);
        // started_at was derived from completed_at minus the duration
        let derived = history[0].completed_at - history[0].started_at.unwrap();
        assert_eq!(derived.num_seconds(), 120);
    }

    #[tokio::test]
    async fn test_visibility_filter() {
        let db = test_db().await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let now = Utc::now();

        for (deck_id, owner, vis) in [
            ("user_aaaa_pub", alice, Visibility::Global),
            ("user_aaaa_sec", alice, Visibility::Private),
            ("user_bbbb_pub", bob, Visibility::Global),
        ] {
            db.insert_user_deck(&UserDeckRecord {
                deck_id: deck_id.into(),
                owner_id: owner,
                title: deck_id.into(),
                visibility: vis,
                filename: format!("{deck_id}.yaml"),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        }

        let anon: Vec<String> = db
            .list_visible_user_decks(None)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.deck_id)
            .collect();
        assert_eq!(anon, vec!["user_aaaa_pub", "user_bbbb_pub"]);

        let as_alice: Vec<String> = db
            .list_visible_user_decks(Some(alice))
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.deck_id)
            .collect();
        assert_eq!(as_alice, vec!["user_aaaa_pub", "user_aaaa_sec", "user_bbbb_pub"]);
    }

    #[tokio::test]
    async fn test_rating_upsert_and_summary() {
        let db = test_db().await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        db.upsert_rating(alice, "deck1", 5).await.unwrap();
        db.upsert_rating(bob, "deck1", 2).await.unwrap();
        // Re-rating replaces rather than adds
        db.upsert_rating(bob, "deck1", 3).await.unwrap();

        let (average, count) = db.rating_summary("deck1").await.unwrap();
        assert_eq!(count, 2);
        assert!((average.unwrap() - 4.0).abs() < f64::EPSILON);

        let own = db.get_user_rating(bob, "deck1").await.unwrap().unwrap();
        assert_eq!(own.stars, 3);
        assert!(db.get_user_rating(alice, "deck2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_log_roundtrip() {
        let db = test_db().await;
        let user = test_user(Uuid::new_v4());

        db.record_download(&user, "deck1", "deck1.yaml").await.unwrap();
        let downloads = db.recent_downloads(10).await.unwrap();
        assert_eq!(downloads.len(), 1);
        assert_eq!(downloads[0].deck_id, "deck1");
        assert_eq!(downloads[0].user_email.as_deref(), Some("user@example.com"));
    }
}
