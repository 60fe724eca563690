//! Snapshot wire format and reference reconciliation
//!
//! A snapshot bundles the whole study state: the card list, the box
//! assignment (box number to card references), and the color mapping.
//! The same shape travels in both directions, to and from the host page
//! and the local fallback slots.
//!
//! Inbound data is treated as untrusted. Historical producers wrote box
//! references in several shapes (a bare id string, an object wrapping
//! the id, or a doubly wrapped object), and real payloads mix them
//! within one list. Loading therefore never fails outright: entries
//! that cannot be tied to a known card are dropped and reported as
//! [`ReconciliationWarning`]s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cards::{Card, ColorMapping};

/// Schema version stamped on outbound snapshots
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Box number (as a JSON object key) to the raw card references it holds
pub type BoxAssignment = BTreeMap<String, Vec<Value>>;

/// Full study state as it travels over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Card list; absent when the producer had nothing to say about cards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub boxes: BoxAssignment,
    #[serde(default, skip_serializing_if = "ColorMapping::is_empty")]
    pub colors: ColorMapping,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            cards: None,
            boxes: BoxAssignment::new(),
            colors: ColorMapping::new(),
        }
    }
}

impl SyncSnapshot {
    /// Whether the snapshot carries a card list worth adopting
    pub fn has_cards(&self) -> bool {
        self.cards.is_some()
    }

    /// Assemble a snapshot from the three fallback slot values
    ///
    /// Each slot decodes independently and leniently: a malformed slot or
    /// list entry is reported and skipped, never fatal. A missing or
    /// unusable cards slot leaves `cards` absent so callers know there is
    /// nothing to adopt.
    pub fn from_slots(
        cards: Option<Value>,
        boxes: Option<Value>,
        colors: Option<Value>,
    ) -> (Self, Vec<ReconciliationWarning>) {
        let mut warnings = Vec::new();
        let mut snapshot = Self::default();

        if let Some(value) = cards {
            match value {
                Value::Array(entries) => {
                    let mut decoded = Vec::with_capacity(entries.len());
                    for entry in entries {
                        match serde_json::from_value::<Card>(entry) {
                            Ok(card) => decoded.push(card),
                            Err(err) => warnings.push(ReconciliationWarning::MalformedEntry {
                                context: "cards".to_string(),
                                detail: err.to_string(),
                            }),
                        }
                    }
                    snapshot.cards = Some(decoded);
                }
                other => warnings.push(ReconciliationWarning::MalformedEntry {
                    context: "cards".to_string(),
                    detail: format!("expected an array, got {}", value_kind(&other)),
                }),
            }
        }

        if let Some(value) = boxes {
            match serde_json::from_value::<BoxAssignment>(value) {
                Ok(assignment) => snapshot.boxes = assignment,
                Err(err) => warnings.push(ReconciliationWarning::MalformedEntry {
                    context: "boxes".to_string(),
                    detail: err.to_string(),
                }),
            }
        }

        if let Some(value) = colors {
            match serde_json::from_value::<ColorMapping>(value) {
                Ok(colors) => snapshot.colors = colors,
                Err(err) => warnings.push(ReconciliationWarning::MalformedEntry {
                    context: "colors".to_string(),
                    detail: err.to_string(),
                }),
            }
        }

        (snapshot, warnings)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Non-fatal defect found while adopting a snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconciliationWarning {
    #[error("box {box_num} references no known card: {reference}")]
    DanglingReference { box_num: u8, reference: String },

    #[error("card {card_id} already placed in box {kept_box}, ignoring box {box_num}")]
    DuplicateReference {
        card_id: String,
        kept_box: u8,
        box_num: u8,
    },

    #[error("duplicate card id in snapshot: {card_id}")]
    DuplicateCard { card_id: String },

    #[error("unusable {context} entry: {detail}")]
    MalformedEntry { context: String, detail: String },
}

/// Parse a box-assignment key into a box number, if it names one
pub(crate) fn parse_box_key(key: &str) -> Option<u8> {
    key.trim()
        .parse::<u8>()
        .ok()
        .filter(|n| (1..=5).contains(n))
}

const ID_KEYS: [&str; 2] = ["cardId", "id"];

/// Recover the card id behind one box-assignment reference
///
/// Tries, in order: the reference as a bare id string, an object carrying
/// the id one level down, then a doubly wrapped object. Every candidate is
/// checked against `is_known`; a reference that never lands on a known card
/// resolves to `None` and is the caller's to report.
pub fn resolve_card_ref<F>(reference: &Value, is_known: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    if let Some(id) = reference.as_str() {
        return is_known(id).then(|| id.to_string());
    }

    for key in ID_KEYS {
        if let Some(id) = reference.get(key).and_then(Value::as_str) {
            if is_known(id) {
                return Some(id.to_string());
            }
        }
    }

    for outer in ID_KEYS {
        if let Some(inner) = reference.get(outer) {
            for key in ID_KEYS {
                if let Some(id) = inner.get(key).and_then(Value::as_str) {
                    if is_known(id) {
                        return Some(id.to_string());
                    }
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known(id: &str) -> bool {
        id == "x"
    }

    #[test]
    fn test_resolver_accepts_every_historical_shape() {
        let bare = json!("x");
        let wrapped = json!({ "cardId": "x" });
        let wrapped_id = json!({ "id": "x" });
        let nested = json!({ "cardId": { "cardId": "x" } });

        assert_eq!(resolve_card_ref(&bare, known).as_deref(), Some("x"));
        assert_eq!(resolve_card_ref(&wrapped, known).as_deref(), Some("x"));
        assert_eq!(resolve_card_ref(&wrapped_id, known).as_deref(), Some("x"));
        assert_eq!(resolve_card_ref(&nested, known).as_deref(), Some("x"));
    }

    #[test]
    fn test_resolver_drops_unknown_ids() {
        assert_eq!(resolve_card_ref(&json!("bogus"), known), None);
        assert_eq!(resolve_card_ref(&json!({ "cardId": "bogus" }), known), None);
        assert_eq!(resolve_card_ref(&json!(42), known), None);
        assert_eq!(resolve_card_ref(&json!(null), known), None);
    }

    #[test]
    fn test_resolver_reaches_past_unknown_wrapper() {
        // The one-level candidate is not a string, the two-level one is
        let reference = json!({ "cardId": { "id": "x" } });
        assert_eq!(resolve_card_ref(&reference, known).as_deref(), Some("x"));
    }

    #[test]
    fn test_parse_box_key() {
        assert_eq!(parse_box_key("1"), Some(1));
        assert_eq!(parse_box_key(" 5 "), Some(5));
        assert_eq!(parse_box_key("0"), None);
        assert_eq!(parse_box_key("6"), None);
        assert_eq!(parse_box_key("box1"), None);
    }

    #[test]
    fn test_from_slots_decodes_leniently() {
        let cards = json!([
            { "id": "c1", "question": "Q?", "timestamp": "2024-03-01T10:00:00Z" },
            { "id": "c2", "timestamp": "not a date" }
        ]);
        let boxes = json!({ "1": ["c1"] });

        let (snapshot, warnings) =
            SyncSnapshot::from_slots(Some(cards), Some(boxes), Some(json!("nonsense")));

        let decoded = snapshot.cards.as_deref().unwrap_or_default();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, "c1");
        assert_eq!(snapshot.boxes.get("1").map(Vec::len), Some(1));
        assert!(snapshot.colors.is_empty());
        // One bad card entry, one bad colors slot
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_from_slots_absent_cards_stay_absent() {
        let (snapshot, warnings) = SyncSnapshot::from_slots(None, None, None);
        assert!(!snapshot.has_cards());
        assert!(warnings.is_empty());
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snapshot = SyncSnapshot {
            cards: Some(Vec::new()),
            ..SyncSnapshot::default()
        };
        let text = serde_json::to_string(&snapshot).unwrap();
        let back: SyncSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snapshot);
    }
}
