//! Key-value preference storage seam.
//!
//! Each persisted datum lives under its own key and is independently
//! readable/writable: the camera as JSON, the tile-source id as a plain
//! string, the one-time hint flag as `"true"`.

use std::collections::BTreeMap;

/// Storage key for the persisted camera JSON.
pub const KEY_CAMERA: &str = "viewport.camera";
/// Storage key for the selected tile-source id.
pub const KEY_TILE_SOURCE: &str = "viewport.tile_source";
/// Storage key for the one-time add-marker hint flag.
pub const KEY_HINT_SHOWN: &str = "viewport.hint_shown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefsError {
    StorageUnavailable,
    Io(String),
}

impl std::fmt::Display for PrefsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefsError::StorageUnavailable => write!(f, "preference storage unavailable"),
            PrefsError::Io(msg) => write!(f, "preference storage error: {msg}"),
        }
    }
}

impl std::error::Error for PrefsError {}

pub trait PrefsStore {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;
    fn remove(&mut self, key: &str) -> Result<(), PrefsError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPrefsStore {
    values: BTreeMap<String, String>,
}

impl InMemoryPrefsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefsStore for InMemoryPrefsStore {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PrefsError> {
        self.values.remove(key);
        Ok(())
    }
}
