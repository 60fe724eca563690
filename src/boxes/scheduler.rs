//! Leitner box scheduling
//!
//! Cards move through five boxes on a fixed review cadence. A correct
//! answer promotes a card one box (capped at box 5), an incorrect answer
//! sends it back to box 1. Each box carries a fixed review interval:
//!
//! - Box 1: every day
//! - Box 2: every 2 days
//! - Box 3: every 3 days
//! - Box 4: every 7 days
//! - Box 5: every 21 days
//!
//! The scheduler tracks membership only, as ordered lists of card ids. It
//! performs no existence checks against the card store; callers resolve
//! ids first and keep the mirrored `box_num` on the card in step.

use chrono::{DateTime, Duration, Utc};

/// Number of review boxes
pub const BOX_COUNT: usize = 5;

/// Lowest box, where new and reset cards land
pub const FIRST_BOX: u8 = 1;

/// Highest box; promotions cap here
pub const LAST_BOX: u8 = 5;

/// Days between reviews for boxes 1 through 5
const REVIEW_INTERVAL_DAYS: [i64; BOX_COUNT] = [1, 2, 3, 7, 21];

/// Pull an out-of-range box number back into 1-5
pub fn clamp_box(box_num: u8) -> u8 {
    box_num.clamp(FIRST_BOX, LAST_BOX)
}

/// Review interval in days for a box
pub fn review_interval_days(box_num: u8) -> i64 {
    REVIEW_INTERVAL_DAYS[(clamp_box(box_num) - 1) as usize]
}

/// Due date for a card that entered `box_num` at `entered_at`
pub fn next_review_after(box_num: u8, entered_at: DateTime<Utc>) -> DateTime<Utc> {
    entered_at + Duration::days(review_interval_days(box_num))
}

/// Result of a box move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxTransition {
    /// The card changed boxes; `from` is absent for newly tracked ids
    Moved { from: Option<u8>, to: u8 },
    /// The card was already in the target box; nothing was touched
    Unchanged { box_num: u8 },
}

impl BoxTransition {
    /// Box the card now sits in
    pub fn box_num(&self) -> u8 {
        match *self {
            BoxTransition::Moved { to, .. } => to,
            BoxTransition::Unchanged { box_num } => box_num,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, BoxTransition::Moved { .. })
    }
}

/// Ordered box membership for every tracked card id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxScheduler {
    boxes: [Vec<String>; BOX_COUNT],
}

impl BoxScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(box_num: u8) -> usize {
        (clamp_box(box_num) - 1) as usize
    }

    /// Box currently holding `id`, if tracked
    pub fn box_of(&self, id: &str) -> Option<u8> {
        for (index, members) in self.boxes.iter().enumerate() {
            if members.iter().any(|m| m == id) {
                return Some(index as u8 + 1);
            }
        }
        None
    }

    /// Card ids in a box, in arrival order
    pub fn cards_in(&self, box_num: u8) -> &[String] {
        &self.boxes[Self::slot(box_num)]
    }

    /// Place `id` in `box_num`, removing it from any other box first
    ///
    /// Moving a card to the box it is already in is a complete no-op: the
    /// card keeps its position in the box and no transition is reported.
    pub fn move_to(&mut self, id: &str, box_num: u8) -> BoxTransition {
        let target = clamp_box(box_num);
        let from = self.box_of(id);
        if from == Some(target) {
            return BoxTransition::Unchanged { box_num: target };
        }

        // Clear every box before inserting so an id can never sit in two
        for members in &mut self.boxes {
            members.retain(|m| m != id);
        }
        self.boxes[Self::slot(target)].push(id.to_string());

        BoxTransition::Moved { from, to: target }
    }

    /// Start tracking a new card in box 1
    pub fn register(&mut self, id: &str) -> BoxTransition {
        self.move_to(id, FIRST_BOX)
    }

    /// Advance `id` one box, capped at the last box
    ///
    /// Returns `None` when the id is not tracked.
    pub fn promote(&mut self, id: &str) -> Option<BoxTransition> {
        let current = self.box_of(id)?;
        let target = clamp_box(current.saturating_add(1));
        Some(self.move_to(id, target))
    }

    /// Send `id` back to box 1 from wherever it sits
    ///
    /// Returns `None` when the id is not tracked.
    pub fn reset(&mut self, id: &str) -> Option<BoxTransition> {
        self.box_of(id)?;
        Some(self.move_to(id, FIRST_BOX))
    }

    /// Stop tracking `id`, returning the box it occupied
    pub fn remove(&mut self, id: &str) -> Option<u8> {
        let from = self.box_of(id)?;
        self.boxes[Self::slot(from)].retain(|m| m != id);
        Some(from)
    }

    /// Total tracked card ids across all boxes
    pub fn tracked(&self) -> usize {
        self.boxes.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.iter().all(|b| b.is_empty())
    }

    /// Per-box membership counts, box 1 first
    pub fn counts(&self) -> [usize; BOX_COUNT] {
        let mut counts = [0; BOX_COUNT];
        for (index, members) in self.boxes.iter().enumerate() {
            counts[index] = members.len();
        }
        counts
    }

    pub fn clear(&mut self) {
        for members in &mut self.boxes {
            members.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_table() {
        assert_eq!(review_interval_days(1), 1);
        assert_eq!(review_interval_days(2), 2);
        assert_eq!(review_interval_days(3), 3);
        assert_eq!(review_interval_days(4), 7);
        assert_eq!(review_interval_days(5), 21);
        // Out-of-range numbers clamp to the nearest box
        assert_eq!(review_interval_days(0), 1);
        assert_eq!(review_interval_days(9), 21);
    }

    #[test]
    fn test_register_lands_in_box_one() {
        let mut scheduler = BoxScheduler::new();
        let transition = scheduler.register("c1");

        assert_eq!(transition, BoxTransition::Moved { from: None, to: 1 });
        assert_eq!(scheduler.box_of("c1"), Some(1));
        assert_eq!(scheduler.cards_in(1), ["c1"]);
    }

    #[test]
    fn test_move_to_is_idempotent() {
        let mut scheduler = BoxScheduler::new();
        scheduler.register("c1");
        scheduler.register("c2");

        let first = scheduler.move_to("c1", 3);
        assert_eq!(first, BoxTransition::Moved { from: Some(1), to: 3 });

        let second = scheduler.move_to("c1", 3);
        assert_eq!(second, BoxTransition::Unchanged { box_num: 3 });

        // Repeating a move changes nothing: one copy, same order
        assert_eq!(scheduler.cards_in(3), ["c1"]);
        assert_eq!(scheduler.cards_in(1), ["c2"]);
        assert_eq!(scheduler.tracked(), 2);
    }

    #[test]
    fn test_move_removes_from_previous_box() {
        let mut scheduler = BoxScheduler::new();
        scheduler.register("c1");
        scheduler.move_to("c1", 4);

        assert!(scheduler.cards_in(1).is_empty());
        assert_eq!(scheduler.cards_in(4), ["c1"]);
    }

    #[test]
    fn test_promote_steps_and_caps_at_last_box() {
        let mut scheduler = BoxScheduler::new();
        scheduler.register("c1");

        for expected in 2..=5u8 {
            let transition = scheduler.promote("c1").unwrap();
            assert_eq!(transition.box_num(), expected);
        }

        // Promoting from the last box is a fixed point
        let capped = scheduler.promote("c1").unwrap();
        assert_eq!(capped, BoxTransition::Unchanged { box_num: 5 });
        assert_eq!(scheduler.box_of("c1"), Some(5));
        assert_eq!(scheduler.cards_in(5), ["c1"]);
    }

    #[test]
    fn test_reset_from_every_box() {
        for start in 1..=5u8 {
            let mut scheduler = BoxScheduler::new();
            scheduler.register("c1");
            scheduler.move_to("c1", start);

            let transition = scheduler.reset("c1").unwrap();
            assert_eq!(transition.box_num(), 1);
            assert_eq!(scheduler.box_of("c1"), Some(1));
        }
    }

    #[test]
    fn test_untracked_ids() {
        let mut scheduler = BoxScheduler::new();
        assert!(scheduler.promote("ghost").is_none());
        assert!(scheduler.reset("ghost").is_none());
        assert!(scheduler.remove("ghost").is_none());
        assert_eq!(scheduler.box_of("ghost"), None);
    }

    #[test]
    fn test_remove_reports_previous_box() {
        let mut scheduler = BoxScheduler::new();
        scheduler.register("c1");
        scheduler.move_to("c1", 2);

        assert_eq!(scheduler.remove("c1"), Some(2));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_counts() {
        let mut scheduler = BoxScheduler::new();
        scheduler.register("a");
        scheduler.register("b");
        scheduler.move_to("b", 5);

        assert_eq!(scheduler.counts(), [1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_next_review_after_uses_box_interval() {
        let entered = Utc::now();
        assert_eq!(next_review_after(1, entered), entered + Duration::days(1));
        assert_eq!(next_review_after(5, entered), entered + Duration::days(21));
    }
}
