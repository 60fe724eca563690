//! Debounced persistence and host synchronization
//!
//! Every change to the study state flows through one event queue and is
//! applied by a single task, one event at a time, so mutations land in
//! the order they were observed and nothing else ever holds the state.
//!
//! Mutations do not persist immediately. They mark the state dirty and
//! arm a debounce timer; further changes inside the window re-arm it, so
//! a burst of edits costs one persist. A persist writes the full
//! snapshot to the local fallback slots synchronously, then hands the
//! same snapshot to the host page fire and forget. A periodic autosave
//! backstops the debounce and does nothing while the state is clean.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::fallback::{FallbackError, FallbackStore, BOXES_SLOT, CARDS_SLOT, COLORS_SLOT};
use super::host::{HostChannel, HostError, HostMessage, OutboundMessage, UserInfo};
use super::snapshot::{ReconciliationWarning, SyncSnapshot};
use crate::boxes::{DueFlags, NotificationGate, NotificationSink};
use crate::cards::{CardDraft, CardPatch, CardStoreError};
use crate::collection::{ReviewOutcome, StudyCollection};
use crate::config::EngineConfig;

/// Queue depth for engine events
const EVENT_QUEUE_DEPTH: usize = 64;

/// How long the loop sleeps when no persist is armed
const IDLE_WAIT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fallback store error: {0}")]
    Fallback(#[from] FallbackError),

    #[error("Host channel error: {0}")]
    Host(#[from] HostError),

    #[error("Card store error: {0}")]
    Store(#[from] CardStoreError),

    #[error("Engine is stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Outcome of the most recent persist cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveStatus {
    /// Nothing persisted yet, or a host save is still unacknowledged
    Unknown,
    Saved,
    Failed,
}

impl Default for SaveStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

/// State mutations accepted from the embedding surface
#[derive(Debug, Clone)]
pub enum UserAction {
    AddCard(CardDraft),
    ImportCards(Vec<CardDraft>),
    UpdateCard(CardPatch),
    RemoveCard {
        card_id: String,
    },
    MoveCard {
        card_id: String,
        box_num: u8,
    },
    RecordReview {
        card_id: String,
        outcome: ReviewOutcome,
    },
    SetSubjectColor {
        subject: String,
        color: Option<String>,
    },
    SetTopicColor {
        subject: String,
        topic: String,
        color: String,
    },
}

/// Everything the engine task reacts to
#[derive(Debug)]
pub enum EngineEvent {
    Action(UserAction),
    Host(HostMessage),
    /// Persist now, regardless of the debounce timer
    Flush,
    Shutdown,
}

/// Debounce timer; arming always replaces the previous deadline
#[derive(Debug, Default)]
struct PendingPersist {
    deadline: Option<Instant>,
}

impl PendingPersist {
    fn arm(&mut self, window: Duration) {
        self.deadline = Some(Instant::now() + window);
    }

    fn disarm(&mut self) {
        self.deadline = None;
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// Owns the study state and keeps it persisted
pub struct SyncEngine {
    collection: StudyCollection,
    fallback: Box<dyn FallbackStore>,
    host: Option<Box<dyn HostChannel>>,
    sink: Option<Box<dyn NotificationSink>>,
    config: EngineConfig,
    pending: PendingPersist,
    dirty: bool,
    save_status: SaveStatus,
    last_saved_at: Option<DateTime<Utc>>,
    gate: NotificationGate,
    warnings: Vec<ReconciliationWarning>,
    user: Option<UserInfo>,
}

impl SyncEngine {
    pub fn new(fallback: Box<dyn FallbackStore>, config: EngineConfig) -> Self {
        Self {
            collection: StudyCollection::new(),
            fallback,
            host: None,
            sink: None,
            config,
            pending: PendingPersist::default(),
            dirty: false,
            save_status: SaveStatus::default(),
            last_saved_at: None,
            gate: NotificationGate::new(),
            warnings: Vec::new(),
            user: None,
        }
    }

    /// Attach the host connection; without one the engine is fallback-only
    pub fn with_host(mut self, host: Box<dyn HostChannel>) -> Self {
        self.host = Some(host);
        self
    }

    /// Attach a receiver for due-review flag changes
    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn collection(&self) -> &StudyCollection {
        &self.collection
    }

    pub fn save_status(&self) -> SaveStatus {
        self.save_status
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// Warnings produced by the most recent snapshot adoption
    pub fn warnings(&self) -> &[ReconciliationWarning] {
        &self.warnings
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    /// Flags as last published
    pub fn notification_flags(&self) -> Option<DueFlags> {
        self.gate.last()
    }

    // ==================== Startup ====================

    /// Load whatever the fallback slots hold and greet the host
    ///
    /// A missing or damaged slot starts the engine empty rather than
    /// failing it; the host can still push the authoritative copy later.
    pub fn bootstrap(&mut self) {
        let cards = self.read_slot_lenient(CARDS_SLOT);
        let boxes = self.read_slot_lenient(BOXES_SLOT);
        let colors = self.read_slot_lenient(COLORS_SLOT);

        let (snapshot, mut warnings) = SyncSnapshot::from_slots(cards, boxes, colors);
        if snapshot.has_cards() {
            warnings.extend(self.collection.load_snapshot(&snapshot));
            log::info!(
                "Sync engine: loaded {} cards from fallback storage",
                self.collection.store().len()
            );
        } else {
            log::info!("Sync engine: no fallback data, starting empty");
        }
        self.record_warnings(warnings);
        self.publish_notifications();

        if let Some(host) = &self.host {
            match host.send(&OutboundMessage::Ready) {
                Ok(()) => log::debug!("Sync engine: announced ready to host"),
                Err(err) => log::warn!("Sync engine: host unreachable, staying local: {}", err),
            }
        }
    }

    fn read_slot_lenient(&self, slot: &str) -> Option<serde_json::Value> {
        match self.fallback.read_slot(slot) {
            Ok(value) => value,
            Err(err) => {
                log::error!("Sync engine: failed to read {} slot: {}", slot, err);
                None
            }
        }
    }

    // ==================== Event Processing ====================

    /// Apply one event to completion
    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Action(action) => self.apply_action(action),
            EngineEvent::Host(message) => self.apply_host_message(message),
            EngineEvent::Flush => self.persist(),
            EngineEvent::Shutdown => self.flush_pending(),
        }
    }

    fn apply_action(&mut self, action: UserAction) {
        let now = Utc::now();
        match action {
            UserAction::AddCard(draft) => match self.collection.add_card(draft, now) {
                Ok(card) => {
                    log::debug!("Sync engine: added card {}", card.id);
                    self.mark_dirty();
                }
                Err(err) => log::warn!("Sync engine: add card failed: {}", err),
            },
            UserAction::ImportCards(drafts) => {
                let added = self.collection.import_cards(drafts, now);
                if !added.is_empty() {
                    log::info!("Sync engine: imported {} cards", added.len());
                    self.mark_dirty();
                }
            }
            UserAction::UpdateCard(patch) => match self.collection.update_card(patch, now) {
                Ok(card) => {
                    log::debug!("Sync engine: updated card {}", card.id);
                    self.mark_dirty();
                }
                Err(err) => log::warn!("Sync engine: update card failed: {}", err),
            },
            UserAction::RemoveCard { card_id } => match self.collection.remove_card(&card_id) {
                Ok(_) => self.mark_dirty(),
                Err(err) => log::warn!("Sync engine: remove card failed: {}", err),
            },
            UserAction::MoveCard { card_id, box_num } => {
                match self.collection.move_card(&card_id, box_num, now) {
                    Ok(transition) => {
                        if transition.changed() {
                            self.mark_dirty();
                        }
                    }
                    Err(err) => log::warn!("Sync engine: move card failed: {}", err),
                }
            }
            UserAction::RecordReview { card_id, outcome } => {
                match self.collection.record_review(&card_id, outcome, now) {
                    Ok(transition) => {
                        log::debug!(
                            "Sync engine: review of {} landed in box {}",
                            card_id,
                            transition.box_num()
                        );
                        if transition.changed() {
                            self.mark_dirty();
                        }
                    }
                    Err(err) => log::warn!("Sync engine: record review failed: {}", err),
                }
            }
            UserAction::SetSubjectColor { subject, color } => {
                self.collection.set_subject_color(&subject, color);
                self.mark_dirty();
            }
            UserAction::SetTopicColor {
                subject,
                topic,
                color,
            } => {
                self.collection.set_topic_color(&subject, &topic, color);
                self.mark_dirty();
            }
        }
        self.publish_notifications();
    }

    fn apply_host_message(&mut self, message: HostMessage) {
        match message {
            HostMessage::Auth { user, snapshot } => {
                log::info!("Sync engine: authenticated as {}", user.label());
                self.user = Some(user);
                if let Some(snapshot) = snapshot {
                    self.adopt_snapshot(&snapshot);
                }
                self.send_to_host(&OutboundMessage::AuthConfirmed);
            }
            HostMessage::Snapshot { snapshot } => self.adopt_snapshot(&snapshot),
            HostMessage::SaveAck { ok } => {
                if ok {
                    self.save_status = SaveStatus::Saved;
                    self.last_saved_at = Some(Utc::now());
                    log::debug!("Sync engine: host acknowledged save");
                } else {
                    self.save_status = SaveStatus::Failed;
                    log::warn!("Sync engine: host reported save failure");
                }
            }
        }
    }

    /// Replace local state with a host snapshot, if it carries cards
    fn adopt_snapshot(&mut self, snapshot: &SyncSnapshot) {
        if !snapshot.has_cards() {
            log::debug!("Sync engine: ignoring snapshot without a card list");
            return;
        }

        let warnings = self.collection.load_snapshot(snapshot);
        log::info!(
            "Sync engine: adopted host snapshot with {} cards",
            self.collection.store().len()
        );
        self.record_warnings(warnings);
        // The adopted state still needs to reach the fallback slots
        self.mark_dirty();
        self.publish_notifications();
    }

    fn record_warnings(&mut self, warnings: Vec<ReconciliationWarning>) {
        for warning in &warnings {
            log::warn!("Sync engine: {}", warning);
        }
        self.warnings = warnings;
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.pending.arm(self.config.debounce_window);
    }

    fn send_to_host(&self, message: &OutboundMessage) {
        if let Some(host) = &self.host {
            if let Err(err) = host.send(message) {
                log::warn!("Sync engine: host send failed: {}", err);
            }
        }
    }

    // ==================== Persistence ====================

    /// Write the full snapshot to the fallback slots and offer it to the
    /// host; host delivery is fire and forget
    pub fn persist(&mut self) {
        let snapshot = self.collection.snapshot();
        self.pending.disarm();
        self.dirty = false;

        let fallback_ok = match self.write_fallback(&snapshot) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Sync engine: fallback persist failed: {}", err);
                false
            }
        };

        let host_pending = match &self.host {
            Some(host) => match host.send(&OutboundMessage::SaveRequested { snapshot }) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!(
                        "Sync engine: host save dispatch failed, fallback only: {}",
                        err
                    );
                    false
                }
            },
            None => false,
        };

        self.save_status = if !fallback_ok {
            SaveStatus::Failed
        } else if host_pending {
            // Saved locally; the verdict now belongs to the host ack
            SaveStatus::Unknown
        } else {
            SaveStatus::Saved
        };
        if fallback_ok {
            self.last_saved_at = Some(Utc::now());
        }
    }

    fn write_fallback(&mut self, snapshot: &SyncSnapshot) -> Result<()> {
        let cards = serde_json::to_value(snapshot.cards.as_deref().unwrap_or_default())?;
        let boxes = serde_json::to_value(&snapshot.boxes)?;
        let colors = serde_json::to_value(&snapshot.colors)?;

        self.fallback.write_slot(CARDS_SLOT, &cards)?;
        self.fallback.write_slot(BOXES_SLOT, &boxes)?;
        self.fallback.write_slot(COLORS_SLOT, &colors)?;
        Ok(())
    }

    /// Persist if the debounce deadline has passed
    fn flush_due(&mut self) {
        if self.pending.is_due(Instant::now()) {
            log::debug!("Sync engine: debounce window elapsed, persisting");
            self.persist();
        }
    }

    /// Persist whatever is still unsaved; used on shutdown
    fn flush_pending(&mut self) {
        if self.dirty || self.pending.is_armed() {
            log::info!("Sync engine: flushing unsaved changes");
            self.persist();
        }
    }

    /// Periodic safety net; persists only when a change is still unsaved
    fn autosave(&mut self) {
        if self.dirty {
            log::debug!("Sync engine: autosave writing dirty state");
            self.persist();
        }
        // Box 5 flags can flip with nothing but the passage of time
        self.publish_notifications();
    }

    fn publish_notifications(&mut self) {
        let flags = self.collection.due_flags(Utc::now());
        if self.gate.update(flags) {
            log::debug!("Sync engine: due flags changed: {:?}", flags.as_array());
            if let Some(sink) = &mut self.sink {
                sink.publish(&flags);
            }
        }
    }

    fn persist_deadline(&self) -> Option<Instant> {
        self.pending.deadline()
    }
}

// ==================== Engine Task ====================

/// Control handle for a running engine task
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Queue a state mutation
    pub async fn dispatch(&self, action: UserAction) -> Result<()> {
        self.tx
            .send(EngineEvent::Action(action))
            .await
            .map_err(|_| SyncError::Stopped)
    }

    /// Queue an inbound host message
    pub async fn deliver(&self, message: HostMessage) -> Result<()> {
        self.tx
            .send(EngineEvent::Host(message))
            .await
            .map_err(|_| SyncError::Stopped)
    }

    /// Ask for an immediate persist
    pub async fn flush(&self) -> Result<()> {
        self.tx
            .send(EngineEvent::Flush)
            .await
            .map_err(|_| SyncError::Stopped)
    }

    /// Signal the engine task to flush and stop
    pub fn shutdown(&self) {
        let _ = self.tx.try_send(EngineEvent::Shutdown);
    }
}

/// Spawn the engine task, returning its handle and join handle
///
/// The join handle resolves to the engine once it stops, so an embedder
/// can inspect or restart it.
pub fn start_engine(engine: SyncEngine) -> (EngineHandle, JoinHandle<SyncEngine>) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let task = tokio::spawn(run_engine(engine, rx));
    (EngineHandle { tx }, task)
}

/// Drive the engine until shutdown
///
/// One event is applied at a time; between events the task waits on the
/// earlier of the debounce deadline and the autosave tick.
pub async fn run_engine(
    mut engine: SyncEngine,
    mut events: mpsc::Receiver<EngineEvent>,
) -> SyncEngine {
    engine.bootstrap();

    let mut autosave = tokio::time::interval(engine.config.autosave_interval);
    autosave.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // An interval's first tick completes immediately; swallow it
    autosave.tick().await;

    loop {
        let persist_at = engine
            .persist_deadline()
            .unwrap_or_else(|| Instant::now() + IDLE_WAIT);

        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(EngineEvent::Shutdown) | None => break,
                    Some(event) => engine.handle_event(event),
                }
            }
            _ = tokio::time::sleep_until(persist_at) => engine.flush_due(),
            _ = autosave.tick() => engine.autosave(),
        }
    }

    engine.flush_pending();
    log::info!("Sync engine: stopped");
    engine
}
