//! Canonical in-memory card collection
//!
//! The store owns every card record and is the single source of truth for
//! card payloads. Box placement lives in the box index; the store only
//! mirrors the current box number on each card so serialized records stay
//! self-describing.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::{group_or_general, Card, CardPatch};

#[derive(Error, Debug)]
pub enum CardStoreError {
    #[error("Card validation failed: {0}")]
    Validation(String),

    #[error("Card not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CardStoreError>;

/// Insertion-ordered card collection with id lookup
#[derive(Debug, Clone, Default)]
pub struct CardStore {
    cards: Vec<Card>,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.id == id)
    }

    // ==================== Card Operations ====================

    /// Append a card, rejecting blank or already-present ids
    pub fn add(&mut self, mut card: Card) -> Result<()> {
        if card.id.trim().is_empty() {
            return Err(CardStoreError::Validation(
                "card id must not be empty".to_string(),
            ));
        }
        if self.position(&card.id).is_some() {
            return Err(CardStoreError::Validation(format!(
                "card id already exists: {}",
                card.id
            )));
        }

        card.normalize();
        self.cards.push(card);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.position(id).map(|pos| &self.cards[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Merge the fields present in the patch into the stored card
    ///
    /// The box number is deliberately ignored here; box transitions are
    /// applied through the box index so the two never disagree.
    pub fn update(&mut self, patch: &CardPatch) -> Result<Card> {
        let pos = self
            .position(&patch.id)
            .ok_or_else(|| CardStoreError::NotFound(patch.id.clone()))?;
        let card = &mut self.cards[pos];

        if let Some(subject) = &patch.subject {
            card.subject = subject.clone();
        }
        if let Some(topic) = &patch.topic {
            card.topic = topic.clone();
        }
        if let Some(question_type) = patch.question_type {
            card.question_type = question_type;
        }
        if let Some(question) = &patch.question {
            card.question = Some(question.clone());
        }
        if let Some(options) = &patch.options {
            card.options = options.clone();
        }
        if let Some(correct_answer) = &patch.correct_answer {
            card.correct_answer = Some(correct_answer.clone());
        }
        if let Some(key_points) = &patch.key_points {
            card.key_points = key_points.clone();
        }
        if let Some(acronym) = &patch.acronym {
            card.acronym = Some(acronym.clone());
        }
        if let Some(explanation) = &patch.explanation {
            card.explanation = Some(explanation.clone());
        }
        if let Some(front) = &patch.front {
            card.front = Some(front.clone());
        }
        if let Some(back) = &patch.back {
            card.back = Some(back.clone());
        }
        if let Some(card_color) = &patch.card_color {
            card.card_color = Some(card_color.clone());
        }

        card.normalize();
        Ok(card.clone())
    }

    /// Remove a card, returning the removed record
    pub fn remove(&mut self, id: &str) -> Result<Card> {
        let pos = self
            .position(id)
            .ok_or_else(|| CardStoreError::NotFound(id.to_string()))?;
        Ok(self.cards.remove(pos))
    }

    /// Drop every card, keeping the allocation for the reload that follows
    pub fn clear(&mut self) {
        self.cards.clear();
    }

    // ==================== Queries ====================

    /// Cards matching the given subject and topic, in insertion order
    ///
    /// `None` leaves a dimension unfiltered; blank filter values collapse to
    /// the default group the same way blank card fields do.
    pub fn query<'a>(
        &'a self,
        subject: Option<&'a str>,
        topic: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Card> + 'a {
        let subject = subject.map(group_or_general);
        let topic = topic.map(group_or_general);
        self.cards.iter().filter(move |card| {
            subject.map_or(true, |s| card.subject == s) && topic.map_or(true, |t| card.topic == t)
        })
    }

    /// All cards in insertion order
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(|c| c.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Distinct subjects, sorted; always recomputed from the cards
    pub fn list_subjects(&self) -> Vec<String> {
        self.cards
            .iter()
            .map(|c| c.subject.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct topics under a subject, sorted
    pub fn list_topics(&self, subject: &str) -> Vec<String> {
        let subject = group_or_general(subject);
        self.cards
            .iter()
            .filter(|c| c.subject == subject)
            .map(|c| c.topic.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // ==================== Box Mirroring ====================

    /// Record a box transition on the card itself
    pub(crate) fn apply_box_entry(
        &mut self,
        id: &str,
        box_num: u8,
        entered_at: DateTime<Utc>,
        next_review: DateTime<Utc>,
    ) -> Result<()> {
        let pos = self
            .position(id)
            .ok_or_else(|| CardStoreError::NotFound(id.to_string()))?;
        let card = &mut self.cards[pos];
        card.box_num = box_num;
        card.box_entered_at = Some(entered_at);
        card.next_review = Some(next_review);
        Ok(())
    }

    /// Overwrite the mirrored box number without touching box timestamps,
    /// used when an external snapshot's assignment section wins over the
    /// number carried on the card record
    pub(crate) fn set_box(&mut self, id: &str, box_num: u8) -> Result<()> {
        let pos = self
            .position(id)
            .ok_or_else(|| CardStoreError::NotFound(id.to_string()))?;
        self.cards[pos].box_num = box_num;
        Ok(())
    }
}
