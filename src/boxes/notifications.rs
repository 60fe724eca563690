//! Due-review notification flags
//!
//! One boolean per box, published to the embedding surface under fixed
//! field names. Boxes 1 through 4 are flagged whenever they hold any
//! card. Box 5 is quieter: it is flagged only when some card has sat
//! there for a full 21-day interval, so a freshly promoted card does not
//! ring the bell.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use super::scheduler::{review_interval_days, BoxScheduler, BOX_COUNT, LAST_BOX};
use crate::cards::CardStore;

/// External field names the flags are published under, box 1 first
pub const NOTIFICATION_FIELDS: [&str; BOX_COUNT] = [
    "box1ReviewDue",
    "box2ReviewDue",
    "box3ReviewDue",
    "box4ReviewDue",
    "box5ReviewDue",
];

/// Snapshot of the per-box due flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueFlags([bool; BOX_COUNT]);

impl DueFlags {
    pub fn is_due(&self, box_num: u8) -> bool {
        let box_num = box_num.clamp(1, LAST_BOX);
        self.0[(box_num - 1) as usize]
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&due| due)
    }

    pub fn as_array(&self) -> [bool; BOX_COUNT] {
        self.0
    }

    /// Field name and value pairs in publication order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        NOTIFICATION_FIELDS
            .iter()
            .zip(self.0.iter())
            .map(|(name, due)| (*name, *due))
    }

    /// The flags as the JSON object pushed to external surfaces
    pub fn to_json(&self) -> Value {
        let mut object = serde_json::Map::new();
        for (name, due) in self.fields() {
            object.insert(name.to_string(), json!(due));
        }
        Value::Object(object)
    }
}

impl From<[bool; BOX_COUNT]> for DueFlags {
    fn from(flags: [bool; BOX_COUNT]) -> Self {
        Self(flags)
    }
}

/// Receiver for published flag changes
pub trait NotificationSink: Send {
    fn publish(&mut self, flags: &DueFlags);
}

/// Suppresses repeat publications while the flags are unchanged
#[derive(Debug, Default)]
pub struct NotificationGate {
    last: Option<DueFlags>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest evaluation; true when it differs from the last
    /// published set and should go out
    pub fn update(&mut self, flags: DueFlags) -> bool {
        if self.last == Some(flags) {
            return false;
        }
        self.last = Some(flags);
        true
    }

    pub fn last(&self) -> Option<DueFlags> {
        self.last
    }
}

/// Compute the current due flags from box membership and card age
pub fn evaluate(scheduler: &BoxScheduler, store: &CardStore, now: DateTime<Utc>) -> DueFlags {
    let mut flags = [false; BOX_COUNT];
    for box_num in 1..LAST_BOX {
        flags[(box_num - 1) as usize] = !scheduler.cards_in(box_num).is_empty();
    }

    let maturity = Duration::days(review_interval_days(LAST_BOX));
    flags[(LAST_BOX - 1) as usize] = scheduler
        .cards_in(LAST_BOX)
        .iter()
        .filter_map(|id| store.get(id))
        .any(|card| now.signed_duration_since(card.box_entered_at()) >= maturity);

    DueFlags(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::CardDraft;

    fn seeded(id: &str, box_num: u8, entered_days_ago: i64) -> (BoxScheduler, CardStore) {
        let now = Utc::now();
        let mut store = CardStore::new();
        let mut card = CardDraft {
            question: Some("q".to_string()),
            ..CardDraft::default()
        }
        .into_card(id.to_string(), now - Duration::days(entered_days_ago + 30));
        card.box_num = box_num;
        card.box_entered_at = Some(now - Duration::days(entered_days_ago));
        store.add(card).unwrap();

        let mut scheduler = BoxScheduler::new();
        scheduler.move_to(id, box_num);
        (scheduler, store)
    }

    #[test]
    fn test_empty_boxes_raise_nothing() {
        let flags = evaluate(&BoxScheduler::new(), &CardStore::new(), Utc::now());
        assert!(!flags.any());
    }

    #[test]
    fn test_lower_boxes_flag_on_membership() {
        for box_num in 1..=4u8 {
            let (scheduler, store) = seeded("c1", box_num, 0);
            let flags = evaluate(&scheduler, &store, Utc::now());

            assert!(flags.is_due(box_num));
            assert_eq!(
                flags.as_array().iter().filter(|&&due| due).count(),
                1,
                "only box {box_num} should be due"
            );
        }
    }

    #[test]
    fn test_box_five_silent_until_mature() {
        let (scheduler, store) = seeded("c1", 5, 10);
        let flags = evaluate(&scheduler, &store, Utc::now());
        assert!(!flags.is_due(5));
    }

    #[test]
    fn test_box_five_flags_after_full_interval() {
        let (scheduler, store) = seeded("c1", 5, 22);
        let flags = evaluate(&scheduler, &store, Utc::now());

        assert!(flags.is_due(5));
        for box_num in 1..=4u8 {
            assert!(!flags.is_due(box_num));
        }
    }

    #[test]
    fn test_field_names_and_json_shape() {
        let flags = DueFlags::from([true, false, false, false, true]);
        let value = flags.to_json();

        assert_eq!(value["box1ReviewDue"], true);
        assert_eq!(value["box2ReviewDue"], false);
        assert_eq!(value["box5ReviewDue"], true);
        assert_eq!(value.as_object().map(|o| o.len()), Some(BOX_COUNT));
    }

    #[test]
    fn test_gate_publishes_only_on_change() {
        let mut gate = NotificationGate::new();
        let quiet = DueFlags::default();
        let due = DueFlags::from([true, false, false, false, false]);

        assert!(gate.update(quiet));
        assert!(!gate.update(quiet));
        assert!(gate.update(due));
        assert!(!gate.update(due));
        assert!(gate.update(quiet));
    }
}
