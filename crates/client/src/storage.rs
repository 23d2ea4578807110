//! Persistent local storage: one JSON file per key in the platform config
//! directory:
//! - Linux: `~/.config/jobdash/`
//! - macOS: `~/Library/Application Support/jobdash/`
//! - Windows: `%APPDATA%\jobdash\`
//!
//! This is a best-effort fallback layer, not a primary data path: every
//! failure is caught and logged, never surfaced to the caller. Entries are
//! never expired here; staleness is the caller's responsibility.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Save a value to persistent storage.
///
/// Returns `true` if the operation succeeded.
pub fn save<T: Serialize>(key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => save_raw(key, &json),
        Err(e) => {
            tracing::warn!("storage: failed to serialize '{}': {}", key, e);
            false
        }
    }
}

/// Load a value from persistent storage.
///
/// Returns `None` if the key doesn't exist or deserialization fails.
pub fn load<T: DeserializeOwned>(key: &str) -> Option<T> {
    let json = load_raw(key)?;
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("storage: failed to deserialize '{}': {}", key, e);
            None
        }
    }
}

/// Remove a value from persistent storage.
pub fn remove(key: &str) {
    remove_raw(key);
}

/// Check if a key exists in storage.
pub fn exists(key: &str) -> bool {
    load_raw(key).is_some()
}

// --- Snapshots ---

/// A last-known-good payload for a logical key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot<T> {
    pub payload: T,
    pub saved_at: DateTime<Utc>,
}

/// Record the latest successful payload for `key`. Last writer wins.
pub fn save_snapshot<T: Serialize>(key: &str, payload: &T) -> bool {
    save(
        key,
        &Snapshot {
            payload,
            saved_at: Utc::now(),
        },
    )
}

/// Load the last-known-good payload for `key`, if any.
pub fn load_snapshot<T: DeserializeOwned>(key: &str) -> Option<Snapshot<T>> {
    load(key)
}

/// Storage key for a dashboard payload, per role and user.
pub fn dashboard_key(role: &str, user_id: &str) -> String {
    format!("dashboard_{role}_{user_id}")
}

// --- File backend ---

fn base_dir() -> Option<std::path::PathBuf> {
    // JOBDASH_DATA_DIR overrides the platform config dir.
    let dir = match std::env::var("JOBDASH_DATA_DIR") {
        Ok(custom) => std::path::PathBuf::from(custom),
        Err(_) => dirs::config_dir()?.join("jobdash"),
    };

    if !dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("storage: failed to create {}: {}", dir.display(), e);
            return None;
        }
    }

    Some(dir)
}

fn file_path(key: &str) -> Option<std::path::PathBuf> {
    let dir = base_dir()?;
    // Sanitize key to be a valid filename
    let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
    Some(dir.join(format!("{safe_key}.json")))
}

fn save_raw(key: &str, value: &str) -> bool {
    let Some(path) = file_path(key) else {
        return false;
    };
    match std::fs::write(&path, value) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("storage: failed to write {}: {}", path.display(), e);
            false
        }
    }
}

fn load_raw(key: &str) -> Option<String> {
    let path = file_path(key)?;
    std::fs::read_to_string(path).ok()
}

fn remove_raw(key: &str) {
    if let Some(path) = file_path(key) {
        let _ = std::fs::remove_file(path);
    }
}
