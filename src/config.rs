//! Engine tuning knobs

use std::time::Duration;

/// How long a burst of changes may grow before it is persisted
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Cadence of the background safety-net save
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Timing configuration for the sync engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period after a change before the state is persisted; every
    /// further change within the window restarts it
    pub debounce_window: Duration,
    /// Interval of the periodic autosave, which persists only when some
    /// change is still unsaved
    pub autosave_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }
}
