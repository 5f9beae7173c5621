// ABOUTME: PDF worksheet rendering for printable deck exports
// ABOUTME: Selects up to twelve random cards and lays out questions with answer lines
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! # PDF Worksheets
//!
//! Renders a printable A4 worksheet for a deck: up to twelve randomly
//! selected questions, each followed by a dotted line to write the answer
//! on. Answers themselves never appear in the output.

use crate::errors::{AppError, ErrorCode};
use crate::models::{Card, Deck};
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use rand::seq::SliceRandom;

/// Maximum number of questions on one worksheet
pub const WORKSHEET_CARD_COUNT: usize = 12;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const WRAP_COLUMNS: usize = 88;
const ANSWER_DOTS: usize = 150;

/// Pick the cards for a worksheet: all of them when the deck is small,
/// otherwise a random sample of [`WORKSHEET_CARD_COUNT`].
#[must_use]
pub fn worksheet_cards(cards: &[Card]) -> Vec<&Card> {
    if cards.len() <= WORKSHEET_CARD_COUNT {
        return cards.iter().collect();
    }
    cards
        .choose_multiple(&mut rand::thread_rng(), WORKSHEET_CARD_COUNT)
        .collect()
}

/// Render a deck into worksheet PDF bytes
pub fn deck_worksheet(deck: &Deck) -> Result<Vec<u8>, AppError> {
    let (doc, page, layer) = PdfDocument::new(
        &deck.title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "worksheet",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    let selected = worksheet_cards(&deck.cards);
    {
        let mut writer = PageWriter {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        };

        writer.line(&deck.title, 16.0, &bold);
        writer.line(
            &format!("Worksheet - {} questions", selected.len()),
            10.0,
            &regular,
        );
        writer.space();

        for (idx, card) in selected.iter().enumerate() {
            let question = format!("Question {}: {}", idx + 1, card.question);
            for line in wrap(&question, WRAP_COLUMNS) {
                writer.line(&line, 11.0, &regular);
            }
            writer.line(&format!("Answer: {}", ".".repeat(ANSWER_DOTS)), 10.0, &regular);
            writer.space();
        }

        writer.space();
        writer.line(
            &format!("Generated by Cardbox | {} questions", selected.len()),
            8.0,
            &regular,
        );
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn pdf_error(error: printpdf::Error) -> AppError {
    AppError::new(ErrorCode::InternalError, "failed to render PDF worksheet").with_source(error)
}

/// Writes lines top to bottom, starting a fresh page when the margin is hit
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageWriter<'_> {
    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        if self.y < MARGIN_MM + LINE_HEIGHT_MM {
            let (page, layer) =
                self.doc
                    .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "worksheet");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), font);
        self.y -= LINE_HEIGHT_MM;
    }

    fn space(&mut self) {
        self.y -= LINE_HEIGHT_MM / 2.0;
    }
}

/// Greedy word wrap by column count; overlong words keep their own line
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let fits = current.chars().count() + word.chars().count() + 1 <= columns;
        if !current.is_empty() && !fits {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn card(id: &str, question: &str) -> Card {
        Card {
            id: id.to_string(),
            question: question.to_string(),
            answer: "secret".to_string(),
            explanation: None,
            topic: None,
        }
    }

    fn deck_with_cards(count: usize) -> Deck {
        Deck {
            id: "worksheet_deck".into(),
            title: "Worksheet Deck".into(),
            description: None,
            author: None,
            language: None,
            topics: vec![],
            cards: (0..count)
                .map(|i| card(&format!("c{i}"), &format!("Question number {i}?")))
                .collect(),
        }
    }

    #[test]
    fn test_small_decks_use_every_card() {
        let deck = deck_with_cards(3);
        assert_eq!(worksheet_cards(&deck.cards).len(), 3);
    }

    #[test]
    fn test_large_decks_sample_twelve_distinct_cards() {
        let deck = deck_with_cards(40);
        let selected = worksheet_cards(&deck.cards);
        assert_eq!(selected.len(), WORKSHEET_CARD_COUNT);
        let ids: HashSet<&str> = selected.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), WORKSHEET_CARD_COUNT);
    }

    #[test]
    fn test_worksheet_renders_pdf_bytes() {
        let deck = deck_with_cards(5);
        let bytes = deck_worksheet(&deck).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn test_wrap_splits_on_word_boundaries() {
        let lines = wrap("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);

        // a single overlong word stays intact on its own line
        let lines = wrap("supercalifragilistic ok", 10);
        assert_eq!(lines, vec!["supercalifragilistic", "ok"]);

        assert_eq!(wrap("", 10), vec![String::new()]);
    }
}
