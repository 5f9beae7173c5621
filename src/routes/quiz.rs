// ABOUTME: Quiz endpoints serving question-only card views and checking answers
// ABOUTME: Answers are compared server-side so the quiz payload never leaks them

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Quiz endpoints.
//!
//! The quiz view of a deck contains only questions; the answer check
//! endpoint compares submissions case-insensitively after trimming
//! whitespace and returns the expected answer either way.

use super::AppState;
use crate::errors::AppError;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A card stripped down to its question side
#[derive(Debug, Serialize)]
pub struct QuizCard {
    /// Card id
    pub id: String,
    /// Question text
    pub question: String,
    /// Topic tag, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Question-only view of a deck
#[derive(Debug, Serialize)]
pub struct QuizView {
    /// Deck id
    pub deck_id: String,
    /// Deck title
    pub title: String,
    /// Cards, questions only
    pub cards: Vec<QuizCard>,
}

/// Request body for checking an answer
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    /// Card being answered
    pub card_id: String,
    /// Submitted answer
    pub answer: String,
}

/// Result of an answer check
#[derive(Debug, Serialize)]
pub struct AnswerResult {
    /// Card id
    pub card_id: String,
    /// Whether the submission matched
    pub correct: bool,
    /// The canonical answer
    pub expected_answer: String,
    /// Longer explanation, when the card has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Quiz routes
pub struct QuizRoutes;

impl QuizRoutes {
    /// Build the router for quiz endpoints
    pub fn router() -> Router<Arc<AppState>> {
        Router::new()
            .route("/:deck_id", get(Self::quiz_view))
            .route("/:deck_id/answer", post(Self::check_answer))
    }

    /// Question-only view of a deck, honoring visibility
    async fn quiz_view(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
    ) -> Result<Response, AppError> {
        let viewer = state.optional_user(&headers).await?;
        let (deck, _) = state.catalog.load_deck(&deck_id, viewer.as_ref()).await?;

        let cards = deck
            .cards
            .into_iter()
            .map(|card| QuizCard {
                id: card.id,
                question: card.question,
                topic: card.topic,
            })
            .collect();

        Ok(Json(QuizView {
            deck_id,
            title: deck.title,
            cards,
        })
        .into_response())
    }

    /// Check a submitted answer against the card
    async fn check_answer(
        State(state): State<Arc<AppState>>,
        headers: HeaderMap,
        Path(deck_id): Path<String>,
        Json(request): Json<AnswerRequest>,
    ) -> Result<Response, AppError> {
        let viewer = state.optional_user(&headers).await?;
        let (deck, _) = state.catalog.load_deck(&deck_id, viewer.as_ref()).await?;

        let card = deck
            .cards
            .into_iter()
            .find(|c| c.id == request.card_id)
            .ok_or_else(|| AppError::not_found("Card").with_resource_id(&request.card_id))?;

        let correct = answers_match(&request.answer, &card.answer);
        Ok(Json(AnswerResult {
            card_id: card.id,
            correct,
            expected_answer: card.answer,
            explanation: card.explanation,
        })
        .into_response())
    }
}

/// Case-insensitive comparison ignoring surrounding whitespace
fn answers_match(submitted: &str, expected: &str) -> bool {
    submitted.trim().to_lowercase() == expected.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers_match_is_lenient_on_case_and_whitespace() {
        assert!(answers_match("  Paris ", "paris"));
        assert!(answers_match("HTTP", "http"));
        assert!(!answers_match("Lyon", "Paris"));
        assert!(!answers_match("", "Paris"));
    }
}
