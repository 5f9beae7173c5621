// ABOUTME: Common data structures shared across storage, catalog, and route layers
// ABOUTME: Defines decks, cards, visibility, progress records, and authenticated user context
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Core data models for the Cardbox service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access-control flag for user-created decks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to every user
    Global,
    /// Visible only to the owner
    #[default]
    Private,
}

impl Visibility {
    /// Database text representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Private => "private",
        }
    }

    /// Parse from database text, defaulting to private for unknown values
    #[must_use]
    pub fn from_str_or_private(s: &str) -> Self {
        match s {
            "global" => Self::Global,
            _ => Self::Private,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a catalog entry comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckSource {
    /// Shipped with the service, visible to everyone
    Bundled,
    /// Created by an end user
    User,
}

/// Raw deck document as stored in the backend (content not yet parsed)
#[derive(Debug, Clone)]
pub struct DeckDocument {
    /// Deck ID (filename stem)
    pub id: String,
    /// Filename including extension
    pub filename: String,
    /// Raw YAML content
    pub content: String,
    /// Last-modified time reported by the backend, when available
    pub modified_time: Option<DateTime<Utc>>,
}

/// A single flashcard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    /// Card ID, unique within its deck
    pub id: String,
    /// Question side
    pub question: String,
    /// Answer side
    pub answer: String,
    /// Optional longer explanation shown after answering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Optional topic tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// A fully parsed flashcard deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    /// Deck ID
    pub id: String,
    /// Display title
    pub title: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author attribution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Language tag (free form, e.g. "de", "en")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Topic tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    /// The cards
    pub cards: Vec<Card>,
}

/// Catalog entry: deck metadata without card bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckMeta {
    /// Deck ID
    pub id: String,
    /// Display title
    pub title: String,
    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author attribution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Language tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Topic tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    /// Number of cards in the deck
    pub card_count: usize,
    /// Owner user ID for user decks, absent for bundled decks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    /// Visibility (bundled decks are always global)
    pub visibility: Visibility,
    /// Bundled or user-created
    pub source: DeckSource,
    /// Last-modified time, when the backend reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Database record for a user-created deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDeckRecord {
    /// Namespaced deck ID (`user_<prefix>_<slug>`)
    pub deck_id: String,
    /// Owner user ID
    pub owner_id: Uuid,
    /// Display title at creation/last update
    pub title: String,
    /// Visibility flag
    pub visibility: Visibility,
    /// Stored filename
    pub filename: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Authenticated user resolved from a provider-issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Provider subject, a UUID
    pub id: Uuid,
    /// Email address from the token, when present
    pub email: Option<String>,
    /// Display name from the token, when present
    pub display_name: Option<String>,
    /// Role claims
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    /// Whether the user carries the admin role
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }
}

/// User profile row mirrored from the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID (provider subject)
    pub id: Uuid,
    /// Email address
    pub email: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// First seen
    pub created_at: DateTime<Utc>,
    /// Last profile update
    pub updated_at: Option<DateTime<Utc>>,
}

/// Progress for a single card within a deck
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardProgress {
    /// Leitner box: 1 = learned, 2 = uncertain, 3 = not learned
    #[serde(rename = "box")]
    pub box_number: u8,
    /// When the card was last reviewed
    pub last_reviewed: DateTime<Utc>,
    /// Total number of reviews
    pub review_count: i64,
}

/// Summary of one completed study session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier (`sess_<row id>` when loaded from the database)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Session start, derived from duration when the client omits it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Session end
    pub completed_at: DateTime<Utc>,
    /// Number of cards reviewed
    pub cards_reviewed: i64,
    /// Cards per box at session end
    pub box_distribution: BoxDistribution,
    /// Wall-clock duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

/// Count of cards in each of the three Leitner boxes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoxDistribution {
    /// Learned
    pub box1: i64,
    /// Uncertain
    pub box2: i64,
    /// Not learned
    pub box3: i64,
}

/// A user's rating of a deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckRating {
    /// Deck ID
    pub deck_id: String,
    /// Rating user
    pub user_id: Uuid,
    /// Stars, 1..=5
    pub stars: u8,
    /// When the rating was last changed
    pub rated_at: DateTime<Utc>,
}

/// One recorded deck download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Downloading user
    pub user_id: Uuid,
    /// Email recorded at download time, when known
    pub user_email: Option<String>,
    /// Deck ID
    pub deck_id: String,
    /// Downloaded filename
    pub filename: String,
    /// Timestamp
    pub downloaded_at: DateTime<Utc>,
}
