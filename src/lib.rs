//! Leitner-box flashcard engine with host/fallback state sync
//!
//! This crate provides:
//! - Card storage and querying by subject and topic
//! - Five-box scheduling with fixed review intervals
//! - Due-review notification flags for embedding surfaces
//! - Debounced persistence to local fallback slots and a host page
//!
//! The usual entry point is [`sync::SyncEngine`], driven either through
//! [`sync::start_engine`] on a tokio runtime or synchronously through
//! [`sync::SyncEngine::handle_event`].

pub mod boxes;
pub mod cards;
pub mod collection;
pub mod config;
pub mod sync;

pub use boxes::{BoxScheduler, BoxTransition, DueFlags, NotificationSink, NOTIFICATION_FIELDS};
pub use cards::{Card, CardDraft, CardPatch, CardStore, CardStoreError, ColorMapping, QuestionType};
pub use collection::{ReviewOutcome, StudyCollection, StudyStats};
pub use config::EngineConfig;
pub use sync::{
    EngineHandle, FallbackStore, FileFallback, HostChannel, HostMessage, MemoryFallback,
    OutboundMessage, ReconciliationWarning, SaveStatus, SyncEngine, SyncError, SyncSnapshot,
    UserAction,
};
