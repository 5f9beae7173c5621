// ABOUTME: YAML deck parsing and validation
// ABOUTME: Turns raw deck documents into typed decks and catalog metadata
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Deck document parsing.
//!
//! A deck is a YAML document with an `id`, a `title`, optional metadata
//! (description, author, language, topics), and a non-empty `cards` list.
//! Validation is per-file: a malformed deck yields a [`DeckError`] on direct
//! access and is skipped during catalog listings.

use crate::models::{Deck, DeckDocument, DeckMeta, DeckSource, Visibility};
use thiserror::Error;

/// Validation failure for a deck document
#[derive(Debug, Error)]
pub enum DeckError {
    /// Not valid YAML or does not match the deck schema
    #[error("invalid deck YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The `id` field is empty or contains forbidden characters
    #[error("invalid deck id '{0}': only [A-Za-z0-9_-] allowed")]
    InvalidId(String),
    /// The `title` field is empty
    #[error("deck title must not be empty")]
    EmptyTitle,
    /// The `cards` list is empty
    #[error("deck must contain at least one card")]
    NoCards,
    /// A card is missing its id, question, or answer
    #[error("card at index {index} is incomplete: {reason}")]
    IncompleteCard {
        /// Position in the cards list
        index: usize,
        /// What is missing
        reason: &'static str,
    },
    /// Two cards share the same id
    #[error("duplicate card id '{0}'")]
    DuplicateCardId(String),
}

/// Whether a string is a well-formed deck or card identifier
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Derive a URL-friendly slug from a deck title.
///
/// Lowercases, maps runs of non-alphanumeric characters to single
/// underscores, and trims leading/trailing underscores.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_sep = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Parse and validate a deck from raw YAML content
pub fn parse_deck(content: &str) -> Result<Deck, DeckError> {
    let deck: Deck = serde_yaml::from_str(content)?;
    validate_deck(&deck)?;
    Ok(deck)
}

/// Validate an already-deserialized deck
pub fn validate_deck(deck: &Deck) -> Result<(), DeckError> {
    if !is_valid_id(&deck.id) {
        return Err(DeckError::InvalidId(deck.id.clone()));
    }
    if deck.title.trim().is_empty() {
        return Err(DeckError::EmptyTitle);
    }
    if deck.cards.is_empty() {
        return Err(DeckError::NoCards);
    }

    let mut seen = std::collections::HashSet::with_capacity(deck.cards.len());
    for (index, card) in deck.cards.iter().enumerate() {
        if !is_valid_id(&card.id) {
            return Err(DeckError::IncompleteCard {
                index,
                reason: "missing or invalid card id",
            });
        }
        if card.question.trim().is_empty() {
            return Err(DeckError::IncompleteCard {
                index,
                reason: "empty question",
            });
        }
        if card.answer.trim().is_empty() {
            return Err(DeckError::IncompleteCard {
                index,
                reason: "empty answer",
            });
        }
        if !seen.insert(card.id.clone()) {
            return Err(DeckError::DuplicateCardId(card.id.clone()));
        }
    }
    Ok(())
}

/// Extract catalog metadata from a stored document.
///
/// The document id (filename stem) wins over the id inside the YAML so that
/// renamed files stay addressable under their storage key.
pub fn meta_from_document(
    doc: &DeckDocument,
    source: DeckSource,
    owner_id: Option<uuid::Uuid>,
    visibility: Visibility,
) -> Result<DeckMeta, DeckError> {
    let deck = parse_deck(&doc.content)?;
    Ok(DeckMeta {
        id: doc.id.clone(),
        title: deck.title,
        description: deck.description,
        author: deck.author,
        language: deck.language,
        topics: deck.topics,
        card_count: deck.cards.len(),
        owner_id,
        visibility,
        source,
        updated_at: doc.modified_time,
    })
}
