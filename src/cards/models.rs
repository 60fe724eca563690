//! Data models for study cards

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grouping label applied when a card has no subject or topic of its own
pub const GENERAL_GROUP: &str = "General";

fn default_group() -> String {
    GENERAL_GROUP.to_string()
}

fn default_box() -> u8 {
    1
}

/// Substitute the default group label for blank or whitespace-only names
pub fn group_or_general(name: &str) -> &str {
    if name.trim().is_empty() {
        GENERAL_GROUP
    } else {
        name
    }
}

/// Question format of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    /// Short typed answer
    ShortAnswer,
    /// Pick one of several options
    MultipleChoice,
    /// Long-form written answer graded against key points
    Essay,
    /// Expand an acronym letter by letter
    Acronym,
    /// Unstructured front/back pair
    FreeForm,
}

impl Default for QuestionType {
    fn default() -> Self {
        Self::ShortAnswer
    }
}

/// A study card tracked through the five review boxes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    #[serde(default = "default_group")]
    pub subject: String,
    #[serde(default = "default_group")]
    pub topic: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acronym: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_color: Option<String>,
    /// Current box, kept in step with the box index (1-5)
    #[serde(default = "default_box")]
    pub box_num: u8,
    /// Creation time, kept under its historical wire name
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// When the card last entered its current box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_entered_at: Option<DateTime<Utc>>,
    /// Informational due date derived from the box interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review: Option<DateTime<Utc>>,
}

impl Card {
    /// When the card entered its current box, falling back to creation time
    /// for records predating box metadata
    pub fn box_entered_at(&self) -> DateTime<Utc> {
        self.box_entered_at.unwrap_or(self.created_at)
    }

    /// Apply the defaults expected of externally supplied records: blank
    /// groups collapse to the shared default and the box number is pulled
    /// back into range
    pub fn normalize(&mut self) {
        if self.subject.trim().is_empty() {
            self.subject = default_group();
        }
        if self.topic.trim().is_empty() {
            self.topic = default_group();
        }
        self.box_num = self.box_num.clamp(1, 5);
    }
}

/// Payload for creating a card; everything the engine stamps itself is absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraft {
    /// Caller-supplied id; minted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acronym: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_num: Option<u8>,
}

impl CardDraft {
    /// Build the stored card, stamping identity and box metadata
    pub fn into_card(self, id: String, now: DateTime<Utc>) -> Card {
        let box_num = self.box_num.unwrap_or_else(default_box).clamp(1, 5);
        let mut card = Card {
            id,
            subject: self.subject.unwrap_or_else(default_group),
            topic: self.topic.unwrap_or_else(default_group),
            question_type: self.question_type,
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer,
            key_points: self.key_points,
            acronym: self.acronym,
            explanation: self.explanation,
            front: self.front,
            back: self.back,
            card_color: self.card_color,
            box_num,
            created_at: now,
            box_entered_at: Some(now),
            next_review: None,
        };
        card.normalize();
        card
    }
}

/// Partial update for an existing card; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acronym: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_color: Option<String>,
    /// Box changes are routed through the box index, never applied directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_num: Option<u8>,
}

impl CardPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Colors chosen for one subject and its topics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectColors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub topics: HashMap<String, String>,
}

/// Subject name to color assignments, persisted alongside the cards
pub type ColorMapping = HashMap<String, SubjectColors>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_defaults_group_and_box() {
        let draft = CardDraft {
            question: Some("What is spaced repetition?".to_string()),
            ..CardDraft::default()
        };
        let card = draft.into_card("c1".to_string(), Utc::now());

        assert_eq!(card.subject, GENERAL_GROUP);
        assert_eq!(card.topic, GENERAL_GROUP);
        assert_eq!(card.box_num, 1);
        assert_eq!(card.question_type, QuestionType::ShortAnswer);
        assert_eq!(card.box_entered_at(), card.created_at);
    }

    #[test]
    fn test_normalize_clamps_box_and_blank_groups() {
        let draft = CardDraft {
            subject: Some("  ".to_string()),
            box_num: Some(9),
            ..CardDraft::default()
        };
        let card = draft.into_card("c2".to_string(), Utc::now());

        assert_eq!(card.subject, GENERAL_GROUP);
        assert_eq!(card.box_num, 5);
    }

    #[test]
    fn test_card_wire_names() {
        let card = CardDraft {
            subject: Some("Biology".to_string()),
            question: Some("Define osmosis".to_string()),
            ..CardDraft::default()
        }
        .into_card("c3".to_string(), Utc::now());

        let value = serde_json::to_value(&card).unwrap();
        assert!(value.get("timestamp").is_some());
        assert!(value.get("boxEnteredAt").is_some());
        assert_eq!(value["boxNum"], 1);
        assert_eq!(value["questionType"], "short-answer");
        // Unset content fields stay off the wire entirely
        assert!(value.get("acronym").is_none());
    }

    #[test]
    fn test_card_deserialize_legacy_record() {
        // Minimal shape produced before box metadata existed
        let card: Card = serde_json::from_str(
            r#"{"id":"old-1","question":"2+2?","timestamp":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(card.subject, GENERAL_GROUP);
        assert_eq!(card.box_num, 1);
        assert_eq!(card.box_entered_at(), card.created_at);
        assert!(card.next_review.is_none());
    }

    #[test]
    fn test_group_or_general() {
        assert_eq!(group_or_general(""), GENERAL_GROUP);
        assert_eq!(group_or_general("   "), GENERAL_GROUP);
        assert_eq!(group_or_general("Chemistry"), "Chemistry");
    }
}
