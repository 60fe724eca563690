//! State synchronization: snapshots, fallback persistence, host messaging

pub mod fallback;
pub mod host;
pub mod snapshot;

mod engine;

pub use engine::{
    run_engine, start_engine, EngineEvent, EngineHandle, SaveStatus, SyncEngine, SyncError,
    UserAction,
};
pub use fallback::{
    FallbackError, FallbackStore, FileFallback, MemoryFallback, BOXES_SLOT, CARDS_SLOT,
    COLORS_SLOT,
};
pub use host::{ChannelHost, HostChannel, HostError, HostMessage, OutboundMessage, UserInfo};
pub use snapshot::{
    resolve_card_ref, BoxAssignment, ReconciliationWarning, SyncSnapshot, SNAPSHOT_VERSION,
};
