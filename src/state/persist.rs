use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::state::model::{ApplicationState, DEFAULT_MESSAGE_FORMAT, TimeZoneEntry};

pub const STORAGE_KEY: &str = "timezone-data";

/// String key-value slot storage, the only I/O the state container does.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::collections::HashMap;

    use anyhow::Result;
    use parking_lot::Mutex;

    use super::KeyValueStore;

    #[derive(Debug, Default)]
    pub struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_value(key: &str, value: &str) -> Self {
            let store = Self::new();
            store.values.lock().insert(key.to_string(), value.to_string());
            store
        }
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.lock().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.values.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // `None` when the file exists but cannot be used as a slot map.
    fn read_slots(&self) -> Option<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Some(BTreeMap::new()),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "store file is unreadable");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(slots) => Some(slots),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "store file is not a string map");
                None
            }
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_slots().unwrap_or_default().remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = match self.read_slots() {
            Some(slots) => slots,
            None => {
                let backup = self.sibling(".bak");
                fs::copy(&self.path, &backup).with_context(|| {
                    format!("unable to back up store file to {}", backup.display())
                })?;
                warn!(backup = %backup.display(), "starting a new store file, old one kept");
                BTreeMap::new()
            }
        };
        slots.insert(key.to_string(), value.to_string());
        let text = serde_json::to_string_pretty(&slots)?;

        let staging = self.sibling(".tmp");
        fs::write(&staging, format!("{text}\n"))
            .with_context(|| format!("unable to write store file {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("unable to replace store file {}", self.path.display()))?;
        Ok(())
    }
}

pub fn validate(raw: &Value) -> bool {
    let Some(root) = raw.as_object() else {
        return false;
    };
    let has_user_label = root
        .get("user")
        .and_then(Value::as_object)
        .and_then(|user| user.get("label"))
        .is_some_and(Value::is_string);
    if !has_user_label {
        return false;
    }
    let Some(time_zones) = root.get("timeZones").and_then(Value::as_array) else {
        return false;
    };
    time_zones.iter().all(|entry| {
        entry.as_object().is_some_and(|entry| {
            entry.get("label").is_some_and(Value::is_string)
                && entry.get("timeZone").is_some_and(Value::is_string)
        })
    })
}

pub fn parse_envelope(content: &str) -> Option<ApplicationState> {
    let raw = match serde_json::from_str::<Value>(content) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(error = %err, "saved state is not valid JSON");
            return None;
        }
    };
    if !validate(&raw) {
        debug!("saved state failed validation");
        return None;
    }

    let user_label = raw["user"]["label"].as_str().unwrap_or_default().to_string();
    let time_zones = raw["timeZones"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .map(|entry| TimeZoneEntry {
                    label: entry["label"].as_str().unwrap_or_default().to_string(),
                    time_zone: entry["timeZone"].as_str().unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let message_format = raw
        .get("message")
        .and_then(|message| message.get("format"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_MESSAGE_FORMAT)
        .to_string();

    Some(ApplicationState {
        user_label,
        time_zones,
        message_format,
        custom_date_time: None,
    })
}

pub fn envelope_text(state: &ApplicationState) -> Result<String> {
    let time_zones = state
        .time_zones
        .iter()
        .map(|entry| {
            let mut entry_obj = Map::new();
            entry_obj.insert("label".to_string(), Value::String(entry.label.clone()));
            entry_obj.insert(
                "timeZone".to_string(),
                Value::String(entry.time_zone.clone()),
            );
            Value::Object(entry_obj)
        })
        .collect::<Vec<_>>();

    let payload = json!({
        "user": { "label": state.user_label },
        "timeZones": time_zones,
        "message": { "format": state.message_format },
    });
    Ok(serde_json::to_string(&payload)?)
}

pub fn load(store: &dyn KeyValueStore) -> Result<ApplicationState> {
    let Some(content) = store.get(STORAGE_KEY)? else {
        debug!("no saved state, using defaults");
        return Ok(ApplicationState::default());
    };
    Ok(parse_envelope(&content).unwrap_or_default())
}

pub fn save(store: &dyn KeyValueStore, state: &ApplicationState) -> Result<()> {
    let text = envelope_text(state)?;
    store
        .set(STORAGE_KEY, &text)
        .context("unable to save application state")?;
    debug!(time_zones = state.time_zones.len(), "saved application state");
    Ok(())
}
