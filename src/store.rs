//! Namespaced key-value persistence for the user's local data.
//!
//! Every key is stored under [`KEY_PREFIX`] so the medium can be shared with
//! unrelated data. Reads never fail: a missing, unreadable or corrupt entry is
//! reported as absent and typed loads fall back to the key's default.

use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

pub const KEY_PREFIX: &str = "cinexplora_";

pub const FAVORITES: &str = "favorites";
pub const WATCHLIST: &str = "watchlist";
pub const COLLECTIONS: &str = "collections";
pub const MOVIES_DISCOVERED: &str = "moviesDiscovered";
pub const FAVORITES_COUNT: &str = "favoritesCount";
pub const THEME: &str = "theme";

pub trait KeyValueStore: Send + Sync {
    /// Raw stored text for an un-prefixed key, if any.
    fn read_raw(&self, key: &str) -> Option<String>;

    fn write_raw(&self, key: &str, contents: &str) -> Result<()>;

    fn read(&self, key: &str) -> Option<Value> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(source) => {
                let err = AppError::PersistenceRead {
                    key: key.to_string(),
                    source,
                };
                warn!("{}; using default", err);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        self.write_raw(key, &value.to_string())
    }
}

/// Typed read that falls back to `T::default()` on absence or corruption.
pub fn load<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    let Some(value) = store.read(key) else {
        return T::default();
    };
    match serde_json::from_value(value) {
        Ok(v) => v,
        Err(source) => {
            let err = AppError::PersistenceRead {
                key: key.to_string(),
                source,
            };
            warn!("{}; using default", err);
            T::default()
        }
    }
}

pub fn save<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value).map_err(|source| AppError::PersistenceWrite {
        key: key.to_string(),
        source: source.into(),
    })?;
    store.write(key, &value)
}

pub fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// One `<prefix><key>.json` file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| AppError::PersistenceWrite {
            key: dir.display().to_string(),
            source,
        })?;
        debug!(dir = %dir.display(), "Opened local store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", namespaced(key)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn read_raw(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Some(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_raw(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let to_err = |source| AppError::PersistenceWrite {
            key: key.to_string(),
            source,
        };
        fs::write(&tmp, contents).map_err(to_err)?;
        fs::rename(&tmp, &path).map_err(to_err)?;
        Ok(())
    }
}

/// In-process store; also lets tests plant corrupt payloads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(self, key: &str, contents: &str) -> Self {
        self.lock().insert(namespaced(key), contents.to_string());
        self
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(&namespaced(key)).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn read_raw(&self, key: &str) -> Option<String> {
        self.lock().get(&namespaced(key)).cloned()
    }

    fn write_raw(&self, key: &str, contents: &str) -> Result<()> {
        self.lock().insert(namespaced(key), contents.to_string());
        Ok(())
    }
}
