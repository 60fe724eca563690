//! Local fallback persistence
//!
//! When no host page is listening (or while it is unreachable), study
//! state lives in three JSON slots in a local key-value layer: the card
//! list, the box assignment, and the color mapping. Reads are lenient;
//! a missing or unreadable slot is simply empty, never an error, so a
//! damaged file can at worst lose data it already failed to hold.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;

/// Slot holding the card list
pub const CARDS_SLOT: &str = "cards";
/// Slot holding the box assignment
pub const BOXES_SLOT: &str = "boxes";
/// Slot holding the color mapping
pub const COLORS_SLOT: &str = "colors";

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FallbackError>;

/// Keyed JSON persistence the engine can fall back on without a host
pub trait FallbackStore: Send {
    /// Read a slot; `None` covers both absent and unreadable data
    fn read_slot(&self, slot: &str) -> Result<Option<Value>>;

    /// Overwrite a slot
    fn write_slot(&mut self, slot: &str, value: &Value) -> Result<()>;
}

/// Fallback slots as pretty-printed JSON files in one directory
pub struct FileFallback {
    dir: PathBuf,
}

impl FileFallback {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform data directory for the engine's fallback slots
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("kartei"))
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl FallbackStore for FileFallback {
    fn read_slot(&self, slot: &str) -> Result<Option<Value>> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                log::warn!(
                    "Fallback store: unreadable {} slot, treating as empty: {}",
                    slot,
                    err
                );
                Ok(None)
            }
        }
    }

    fn write_slot(&mut self, slot: &str, value: &Value) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.slot_path(slot), serde_json::to_string_pretty(value)?)?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    slots: HashMap<String, Value>,
    writes: usize,
}

/// In-memory fallback slots behind a shared handle
///
/// Clones share the same storage, so an embedder (or a test) can keep one
/// handle while the engine owns another and still observe every write.
#[derive(Clone, Default)]
pub struct MemoryFallback {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryFallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of a slot
    pub fn slot(&self, slot: &str) -> Option<Value> {
        self.inner.lock().unwrap().slots.get(slot).cloned()
    }

    /// Seed a slot without counting it as an engine write
    pub fn seed(&self, slot: &str, value: Value) {
        self.inner.lock().unwrap().slots.insert(slot.to_string(), value);
    }

    /// Number of slot writes performed through the store
    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }
}

impl FallbackStore for MemoryFallback {
    fn read_slot(&self, slot: &str) -> Result<Option<Value>> {
        Ok(self.inner.lock().unwrap().slots.get(slot).cloned())
    }

    fn write_slot(&mut self, slot: &str, value: &Value) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.slots.insert(slot.to_string(), value.clone());
        inner.writes += 1;
        Ok(())
    }
}
