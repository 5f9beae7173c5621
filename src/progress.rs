// ABOUTME: Study progress tracking built on the three-box Leitner system
// ABOUTME: Validates incoming card progress, persists it, and assembles progress reports
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! # Progress Tracking
//!
//! Cards move between three Leitner boxes (1 = learned, 2 = uncertain,
//! 3 = not learned). Clients submit the full box state after a study
//! session; entries with an out-of-range box are logged and skipped rather
//! than rejecting the whole update. Session history is capped at the most
//! recent twenty sessions per deck.

use crate::database::Database;
use crate::errors::AppError;
use crate::models::{AuthenticatedUser, BoxDistribution, CardProgress, SessionSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Maximum study sessions returned per deck
pub const SESSION_HISTORY_LIMIT: i64 = 20;

const BOX_RANGE: std::ops::RangeInclusive<u8> = 1..=3;

/// One card's state in a progress update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardProgressUpdate {
    /// Target Leitner box
    #[serde(rename = "box")]
    pub box_number: u8,
    /// Review time; defaults to now when omitted
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
}

/// Request body for saving progress on a deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Card id to new state
    pub cards: BTreeMap<String, CardProgressUpdate>,
    /// Optional summary of the session that produced this update
    #[serde(default)]
    pub session: Option<SessionSummary>,
}

/// Result of a progress save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Cards persisted
    pub saved: usize,
    /// Cards dropped for invalid box numbers
    pub skipped: usize,
    /// Whether a session summary was recorded
    pub session_recorded: bool,
}

/// Full progress view for one user and deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Deck id
    pub deck_id: String,
    /// Card id to current state
    pub cards: BTreeMap<String, CardProgress>,
    /// Recent sessions, newest first
    pub sessions: Vec<SessionSummary>,
    /// Most recent change across all cards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProgressReport {
    /// Current distribution of cards across the three boxes
    #[must_use]
    pub fn box_distribution(&self) -> BoxDistribution {
        let mut dist = BoxDistribution::default();
        for progress in self.cards.values() {
            match progress.box_number {
                1 => dist.box1 += 1,
                2 => dist.box2 += 1,
                _ => dist.box3 += 1,
            }
        }
        dist
    }
}

/// Progress persistence and reporting on top of the database
#[derive(Clone)]
pub struct ProgressTracker {
    database: Database,
}

impl ProgressTracker {
    /// Create a tracker over the given database
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    /// Persist a progress update for a user and deck.
    ///
    /// Invalid box numbers are skipped with a warning. An update where every
    /// card is invalid (or that carries no cards at all) is rejected.
    pub async fn save(
        &self,
        user: &AuthenticatedUser,
        deck_id: &str,
        update: ProgressUpdate,
        deck_title: Option<&str>,
    ) -> Result<SaveOutcome, AppError> {
        if update.cards.is_empty() {
            return Err(AppError::invalid_input("Progress update contains no cards"));
        }

        let now = Utc::now();
        let mut accepted = Vec::with_capacity(update.cards.len());
        let mut skipped = 0usize;
        for (card_id, entry) in update.cards {
            if !BOX_RANGE.contains(&entry.box_number) {
                warn!(
                    user_id = %user.id,
                    deck_id,
                    card_id = %card_id,
                    box_number = entry.box_number,
                    "skipping progress entry with out-of-range box"
                );
                skipped += 1;
                continue;
            }
            accepted.push((
                card_id,
                CardProgress {
                    box_number: entry.box_number,
                    last_reviewed: entry.last_reviewed.unwrap_or(now),
                    review_count: 1,
                },
            ));
        }

        if accepted.is_empty() {
            return Err(AppError::invalid_input(
                "Progress update contains no valid cards (box must be 1, 2, or 3)",
            ));
        }

        let session = update.session.map(|mut summary| {
            // Fill the distribution from the submitted cards when the client
            // leaves it zeroed.
            if summary.box_distribution == BoxDistribution::default() {
                for (_, progress) in &accepted {
                    match progress.box_number {
                        1 => summary.box_distribution.box1 += 1,
                        2 => summary.box_distribution.box2 += 1,
                        _ => summary.box_distribution.box3 += 1,
                    }
                }
            }
            if summary.cards_reviewed == 0 {
                summary.cards_reviewed = accepted.len() as i64;
            }
            summary
        });

        let session_recorded = session.is_some();
        self.database
            .save_progress(user.id, deck_id, &accepted, session.as_ref(), deck_title)
            .await?;

        Ok(SaveOutcome {
            saved: accepted.len(),
            skipped,
            session_recorded,
        })
    }

    /// Assemble the full progress report for a user and deck
    pub async fn report(
        &self,
        user: &AuthenticatedUser,
        deck_id: &str,
    ) -> Result<ProgressReport, AppError> {
        let rows = self.database.load_card_progress(user.id, deck_id).await?;
        let sessions = self
            .database
            .session_history(user.id, deck_id, SESSION_HISTORY_LIMIT)
            .await?;

        let mut cards = BTreeMap::new();
        let mut last_updated: Option<DateTime<Utc>> = None;
        for (card_id, progress, updated_at) in rows {
            if let Some(ts) = updated_at {
                last_updated = Some(last_updated.map_or(ts, |current| current.max(ts)));
            }
            cards.insert(card_id, progress);
        }

        Ok(ProgressReport {
            deck_id: deck_id.to_string(),
            cards,
            sessions,
            last_updated,
        })
    }

    /// Delete all card progress for a deck, keeping session history.
    /// Returns the number of card rows removed.
    pub async fn reset(&self, user: &AuthenticatedUser, deck_id: &str) -> Result<u64, AppError> {
        Ok(self.database.delete_card_progress(user.id, deck_id).await?)
    }

    /// Deck ids the user has any progress in
    pub async fn decks_with_progress(
        &self,
        user: &AuthenticatedUser,
    ) -> Result<Vec<String>, AppError> {
        Ok(self.database.deck_ids_with_progress(user.id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use uuid::Uuid;

    fn test_user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::new_v4(),
            email: None,
            display_name: None,
            roles: vec![],
        }
    }

    async fn tracker() -> ProgressTracker {
        ProgressTracker::new(Database::new("sqlite::memory:").await.unwrap())
    }

    fn update_with_boxes(entries: &[(&str, u8)]) -> ProgressUpdate {
        ProgressUpdate {
            cards: entries
                .iter()
                .map(|(id, b)| {
                    (
                        (*id).to_string(),
                        CardProgressUpdate {
                            box_number: *b,
                            last_reviewed: None,
                        },
                    )
                })
                .collect(),
            session: None,
        }
    }

    #[tokio::test]
    async fn test_invalid_boxes_skipped_not_fatal() {
        let tracker = tracker().await;
        let user = test_user();

        let outcome = tracker
            .save(&user, "deck1", update_with_boxes(&[("a", 1), ("b", 0), ("c", 7)]), None)
            .await
            .unwrap();
        assert_eq!(outcome.saved, 1);
        assert_eq!(outcome.skipped, 2);

        let report = tracker.report(&user, "deck1").await.unwrap();
        assert_eq!(report.cards.len(), 1);
        assert_eq!(report.cards["a"].box_number, 1);
    }

    #[tokio::test]
    async fn test_all_invalid_rejected() {
        let tracker = tracker().await;
        let user = test_user();

        let err = tracker
            .save(&user, "deck1", update_with_boxes(&[("a", 9)]), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let err = tracker
            .save(&user, "deck1", update_with_boxes(&[]), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[tokio::test]
    async fn test_session_distribution_derived_from_cards() {
        let tracker = tracker().await;
        let user = test_user();

        let mut update = update_with_boxes(&[("a", 1), ("b", 1), ("c", 3)]);
        update.session = Some(SessionSummary {
            session_id: None,
            started_at: None,
            completed_at: Utc::now(),
            cards_reviewed: 0,
            box_distribution: BoxDistribution::default(),
            duration_seconds: Some(60),
        });

        let outcome = tracker.save(&user, "deck1", update, Some("Deck")).await.unwrap();
        assert!(outcome.session_recorded);

        let report = tracker.report(&user, "deck1").await.unwrap();
        assert_eq!(report.sessions.len(), 1);
        let dist = report.sessions[0].box_distribution;
        assert_eq!((dist.box1, dist.box2, dist.box3), (2, 0, 1));
        assert_eq!(report.sessions[0].cards_reviewed, 3);
    }

    #[tokio::test]
    async fn test_session_history_capped_at_twenty() {
        let tracker = tracker().await;
        let user = test_user();

        for i in 0..25 {
            let mut update = update_with_boxes(&[("a", 2)]);
            update.session = Some(SessionSummary {
                session_id: None,
                started_at: None,
                completed_at: Utc::now() + chrono::Duration::seconds(i),
                cards_reviewed: 1,
                box_distribution: BoxDistribution { box1: 0, box2: 1, box3: 0 },
                duration_seconds: None,
            });
            tracker.save(&user, "deck1", update, None).await.unwrap();
        }

        let report = tracker.report(&user, "deck1").await.unwrap();
        assert_eq!(report.sessions.len(), SESSION_HISTORY_LIMIT as usize);
        // newest first
        let newest = report.sessions[0].completed_at;
        let oldest = report.sessions.last().unwrap().completed_at;
        assert!(newest > oldest);
    }

    #[tokio::test]
    async fn test_reset_clears_cards_only() {
        let tracker = tracker().await;
        let user = test_user();

        let mut update = update_with_boxes(&[("a", 1), ("b", 2)]);
        update.session = Some(SessionSummary {
            session_id: None,
            started_at: None,
            completed_at: Utc::now(),
            cards_reviewed: 2,
            box_distribution: BoxDistribution { box1: 1, box2: 1, box3: 0 },
            duration_seconds: None,
        });
        tracker.save(&user, "deck1", update, None).await.unwrap();

        assert_eq!(tracker.reset(&user, "deck1").await.unwrap(), 2);

        let report = tracker.report(&user, "deck1").await.unwrap();
        assert!(report.cards.is_empty());
        assert_eq!(report.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_report_box_distribution() {
        let tracker = tracker().await;
        let user = test_user();
        tracker
            .save(&user, "deck1", update_with_boxes(&[("a", 1), ("b", 3), ("c", 3)]), None)
            .await
            .unwrap();

        let report = tracker.report(&user, "deck1").await.unwrap();
        let dist = report.box_distribution();
        assert_eq!((dist.box1, dist.box2, dist.box3), (1, 0, 2));
        assert!(report.last_updated.is_some());

        let decks = tracker.decks_with_progress(&user).await.unwrap();
        assert_eq!(decks, vec!["deck1"]);
    }
}
