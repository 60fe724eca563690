//! Coordinated study state
//!
//! [`StudyCollection`] owns the three pieces that must never drift apart:
//! the card store, the box index, and the color mapping. Every mutation
//! funnels through here so a card's mirrored `box_num` always agrees with
//! the box index, and so snapshot loads rebuild everything in one pass.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::boxes::{
    self, next_review_after, review_interval_days, BoxScheduler, BoxTransition, DueFlags,
    BOX_COUNT, FIRST_BOX, LAST_BOX,
};
use crate::cards::store::Result;
use crate::cards::{Card, CardDraft, CardPatch, CardStore, CardStoreError, ColorMapping};
use crate::sync::snapshot::{
    parse_box_key, resolve_card_ref, BoxAssignment, ReconciliationWarning, SyncSnapshot,
    SNAPSHOT_VERSION,
};

/// How a review attempt went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewOutcome {
    Correct,
    Incorrect,
}

/// Derived counts over the whole collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStats {
    pub total_cards: usize,
    pub box_counts: [usize; BOX_COUNT],
    /// Box 5 cards that have sat out their full review interval
    pub mature_cards: usize,
}

/// Card store, box index, and colors, kept consistent as one unit
#[derive(Debug, Clone, Default)]
pub struct StudyCollection {
    store: CardStore,
    scheduler: BoxScheduler,
    colors: ColorMapping,
}

impl StudyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn scheduler(&self) -> &BoxScheduler {
        &self.scheduler
    }

    pub fn colors(&self) -> &ColorMapping {
        &self.colors
    }

    // ==================== Card Mutations ====================

    /// Add one card, minting an id when the draft carries none
    ///
    /// The card lands in its draft box (box 1 when unset) and gets fresh
    /// box metadata. The box index registration cannot fail, so a card is
    /// either fully added or not added at all.
    pub fn add_card(&mut self, mut draft: CardDraft, now: DateTime<Utc>) -> Result<Card> {
        let id = draft
            .id
            .take()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut card = draft.into_card(id, now);
        card.next_review = Some(next_review_after(card.box_num, now));
        let stored = card.clone();

        self.store.add(card)?;
        self.scheduler.move_to(&stored.id, stored.box_num);
        Ok(stored)
    }

    /// Add a batch of drafts, skipping records the store rejects
    pub fn import_cards(&mut self, drafts: Vec<CardDraft>, now: DateTime<Utc>) -> Vec<Card> {
        let mut added = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match self.add_card(draft, now) {
                Ok(card) => added.push(card),
                Err(err) => log::warn!("Import: skipping card: {}", err),
            }
        }
        added
    }

    /// Merge a partial update; a box number in the patch becomes a proper
    /// box transition rather than a field write
    pub fn update_card(&mut self, patch: CardPatch, now: DateTime<Utc>) -> Result<Card> {
        let target_box = patch.box_num;
        let id = patch.id.clone();
        let mut updated = self.store.update(&patch)?;

        if let Some(box_num) = target_box {
            self.move_card(&id, box_num, now)?;
            if let Some(card) = self.store.get(&id) {
                updated = card.clone();
            }
        }
        Ok(updated)
    }

    /// Remove a card from the store and the box index together
    pub fn remove_card(&mut self, id: &str) -> Result<Card> {
        let card = self.store.remove(id)?;
        self.scheduler.remove(id);
        Ok(card)
    }

    // ==================== Box Transitions ====================

    /// Move a card to a box, stamping entry time and the derived due date
    ///
    /// Moving a card to the box it already occupies changes nothing, not
    /// even the timestamps.
    pub fn move_card(
        &mut self,
        id: &str,
        box_num: u8,
        now: DateTime<Utc>,
    ) -> Result<BoxTransition> {
        if !self.store.contains(id) {
            return Err(CardStoreError::NotFound(id.to_string()));
        }

        let transition = self.scheduler.move_to(id, box_num);
        if let BoxTransition::Moved { to, .. } = transition {
            self.store
                .apply_box_entry(id, to, now, next_review_after(to, now))?;
        }
        Ok(transition)
    }

    /// Promote one box on a correct answer, capped at the last box
    pub fn promote_card(&mut self, id: &str, now: DateTime<Utc>) -> Result<BoxTransition> {
        let current = self
            .scheduler
            .box_of(id)
            .ok_or_else(|| CardStoreError::NotFound(id.to_string()))?;
        self.move_card(id, current.saturating_add(1).min(LAST_BOX), now)
    }

    /// Send a card back to box 1 on an incorrect answer
    pub fn reset_card(&mut self, id: &str, now: DateTime<Utc>) -> Result<BoxTransition> {
        if self.scheduler.box_of(id).is_none() {
            return Err(CardStoreError::NotFound(id.to_string()));
        }
        self.move_card(id, FIRST_BOX, now)
    }

    /// Apply a graded answer to the card's box placement
    pub fn record_review(
        &mut self,
        id: &str,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<BoxTransition> {
        match outcome {
            ReviewOutcome::Correct => self.promote_card(id, now),
            ReviewOutcome::Incorrect => self.reset_card(id, now),
        }
    }

    // ==================== Colors ====================

    pub fn set_subject_color(&mut self, subject: &str, color: Option<String>) {
        let subject = crate::cards::group_or_general(subject).to_string();
        self.colors.entry(subject).or_default().base = color;
    }

    pub fn set_topic_color(&mut self, subject: &str, topic: &str, color: String) {
        let subject = crate::cards::group_or_general(subject).to_string();
        let topic = crate::cards::group_or_general(topic).to_string();
        self.colors
            .entry(subject)
            .or_default()
            .topics
            .insert(topic, color);
    }

    // ==================== Snapshots ====================

    /// Export the full study state
    ///
    /// Box references go out as bare id strings; loading accepts older,
    /// wrapped shapes as well.
    pub fn snapshot(&self) -> SyncSnapshot {
        let mut assignment = BoxAssignment::new();
        for box_num in FIRST_BOX..=LAST_BOX {
            let members = self.scheduler.cards_in(box_num);
            if !members.is_empty() {
                assignment.insert(
                    box_num.to_string(),
                    members
                        .iter()
                        .map(|id| Value::String(id.clone()))
                        .collect(),
                );
            }
        }

        SyncSnapshot {
            version: SNAPSHOT_VERSION,
            cards: Some(self.store.cards().to_vec()),
            boxes: assignment,
            colors: self.colors.clone(),
        }
    }

    /// Replace the whole collection with a snapshot's contents
    ///
    /// This is a replacement, never a merge: whatever lived here before is
    /// gone afterward. The box index is rebuilt from the snapshot's
    /// assignment section, which wins over the box number carried on each
    /// card record; cards the assignment never mentions land in box 1.
    /// Unusable entries are skipped and reported, but the load itself
    /// always completes.
    pub fn load_snapshot(&mut self, snapshot: &SyncSnapshot) -> Vec<ReconciliationWarning> {
        let mut warnings = Vec::new();

        self.store.clear();
        self.scheduler.clear();
        self.colors = snapshot.colors.clone();

        for card in snapshot.cards.as_deref().unwrap_or_default() {
            let mut card = card.clone();
            card.normalize();

            if card.id.trim().is_empty() {
                warnings.push(ReconciliationWarning::MalformedEntry {
                    context: "cards".to_string(),
                    detail: "card record without an id".to_string(),
                });
                continue;
            }
            if self.store.contains(&card.id) {
                warnings.push(ReconciliationWarning::DuplicateCard { card_id: card.id });
                continue;
            }
            if let Err(err) = self.store.add(card) {
                warnings.push(ReconciliationWarning::MalformedEntry {
                    context: "cards".to_string(),
                    detail: err.to_string(),
                });
            }
        }

        // Assignment pass: lowest box wins when a card is listed twice
        for (key, references) in &snapshot.boxes {
            let Some(box_num) = parse_box_key(key) else {
                warnings.push(ReconciliationWarning::MalformedEntry {
                    context: "boxes".to_string(),
                    detail: format!("unrecognized box key: {key}"),
                });
                continue;
            };

            for reference in references {
                let resolved = resolve_card_ref(reference, |id| self.store.contains(id));
                let Some(id) = resolved else {
                    warnings.push(ReconciliationWarning::DanglingReference {
                        box_num,
                        reference: reference.to_string(),
                    });
                    continue;
                };

                if let Some(kept_box) = self.scheduler.box_of(&id) {
                    warnings.push(ReconciliationWarning::DuplicateReference {
                        card_id: id,
                        kept_box,
                        box_num,
                    });
                    continue;
                }

                self.scheduler.move_to(&id, box_num);
                if let Err(err) = self.store.set_box(&id, box_num) {
                    log::warn!("Load: failed to mirror box {} on {}: {}", box_num, id, err);
                }
            }
        }

        // Cards the assignment never mentioned start over in box 1
        let unassigned: Vec<String> = self
            .store
            .ids()
            .filter(|id| self.scheduler.box_of(id).is_none())
            .map(String::from)
            .collect();
        for id in unassigned {
            self.scheduler.move_to(&id, FIRST_BOX);
            if let Err(err) = self.store.set_box(&id, FIRST_BOX) {
                log::warn!("Load: failed to mirror box 1 on {}: {}", id, err);
            }
        }

        warnings
    }

    // ==================== Queries ====================

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.store.get(id)
    }

    pub fn query<'a>(
        &'a self,
        subject: Option<&'a str>,
        topic: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Card> + 'a {
        self.store.query(subject, topic)
    }

    pub fn list_subjects(&self) -> Vec<String> {
        self.store.list_subjects()
    }

    pub fn list_topics(&self, subject: &str) -> Vec<String> {
        self.store.list_topics(subject)
    }

    pub fn cards_in_box(&self, box_num: u8) -> &[String] {
        self.scheduler.cards_in(box_num)
    }

    // ==================== Derived State ====================

    pub fn due_flags(&self, now: DateTime<Utc>) -> DueFlags {
        boxes::evaluate(&self.scheduler, &self.store, now)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> StudyStats {
        let maturity = Duration::days(review_interval_days(LAST_BOX));
        let mature_cards = self
            .scheduler
            .cards_in(LAST_BOX)
            .iter()
            .filter_map(|id| self.store.get(id))
            .filter(|card| now.signed_duration_since(card.box_entered_at()) >= maturity)
            .count();

        StudyStats {
            total_cards: self.store.len(),
            box_counts: self.scheduler.counts(),
            mature_cards,
        }
    }
}
