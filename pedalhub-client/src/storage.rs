//! Client-side persistence for session state.
//!
//! Three locations, mirroring what a browser host offers:
//! durable storage (file-backed JSON map), session-scoped storage (in-memory,
//! lost on drop), and a same-origin cookie jar. Logout must purge the session
//! keys from all three: leaving one copy behind is a correctness bug.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_USER: &str = "user";

pub const COOKIE_ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const COOKIE_REFRESH_TOKEN: &str = "REFRESH_TOKEN";

/// String key-value store. Implementations must be usable from any task;
/// write failures are logged, not surfaced, because persistence is a
/// best-effort mirror of in-memory session state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Durable storage: a JSON object persisted to disk on every write.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing contents if present.
    /// An unreadable or malformed file starts the store empty.
    pub fn open(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "discarding malformed storage file");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &Map<String, Value>) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(entries) {
            Ok(contents) => {
                if let Err(err) = std::fs::write(&self.path, contents) {
                    tracing::warn!(path = %self.path.display(), %err, "failed to persist storage");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize storage"),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).and_then(|v| v.as_str().map(String::from))
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), Value::String(value.to_string()));
            self.flush(&entries);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.remove(key).is_some() {
                self.flush(&entries);
            }
        }
    }
}

/// Session-scoped storage: plain in-memory map, gone when the process ends.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// Same-origin cookie jar. The backend sets `ACCESS_TOKEN`/`REFRESH_TOKEN`
/// here; the client only reads and expires them.
pub type CookieJar = MemoryStore;

/// The three persistence locations bundled for the session store.
pub struct Storage {
    pub durable: Box<dyn KeyValueStore>,
    pub session: Box<dyn KeyValueStore>,
    pub cookies: Box<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(
        durable: Box<dyn KeyValueStore>,
        session: Box<dyn KeyValueStore>,
        cookies: Box<dyn KeyValueStore>,
    ) -> Self {
        Self {
            durable,
            session,
            cookies,
        }
    }

    /// File-backed durable storage with fresh session/cookie stores.
    pub fn file_backed(path: PathBuf) -> Self {
        Self::new(
            Box::new(FileStore::open(path)),
            Box::new(MemoryStore::new()),
            Box::new(CookieJar::new()),
        )
    }

    /// In-memory everywhere. Used by tests and ephemeral sessions.
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(MemoryStore::new()),
            Box::new(MemoryStore::new()),
            Box::new(MemoryStore::new()),
        )
    }

    /// Remove every persisted copy of the session: tokens and user from
    /// durable storage, the session mirror, and the auth cookies. Idempotent.
    pub fn purge_session_keys(&self) {
        for key in [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER] {
            self.durable.remove(key);
            self.session.remove(key);
        }
        for cookie in [COOKIE_ACCESS_TOKEN, COOKIE_REFRESH_TOKEN, KEY_USER] {
            self.cookies.remove(cookie);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(path.clone());
        store.set(KEY_ACCESS_TOKEN, "abc123");
        drop(store);

        // Reopen and read back from disk.
        let store = FileStore::open(path);
        assert_eq!(store.get(KEY_ACCESS_TOKEN), Some("abc123".to_string()));
        store.remove(KEY_ACCESS_TOKEN);
        assert_eq!(store.get(KEY_ACCESS_TOKEN), None);
    }

    #[test]
    fn test_malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = FileStore::open(path);
        assert_eq!(store.get(KEY_USER), None);
    }

    #[test]
    fn test_purge_clears_all_three_locations() {
        let storage = Storage::in_memory();
        storage.durable.set(KEY_ACCESS_TOKEN, "t1");
        storage.durable.set(KEY_REFRESH_TOKEN, "t2");
        storage.durable.set(KEY_USER, "{}");
        storage.session.set(KEY_USER, "{}");
        storage.cookies.set(COOKIE_ACCESS_TOKEN, "t1");
        storage.cookies.set(COOKIE_REFRESH_TOKEN, "t2");

        storage.purge_session_keys();

        assert_eq!(storage.durable.get(KEY_ACCESS_TOKEN), None);
        assert_eq!(storage.durable.get(KEY_REFRESH_TOKEN), None);
        assert_eq!(storage.durable.get(KEY_USER), None);
        assert_eq!(storage.session.get(KEY_USER), None);
        assert_eq!(storage.cookies.get(COOKIE_ACCESS_TOKEN), None);
        assert_eq!(storage.cookies.get(COOKIE_REFRESH_TOKEN), None);
    }

    #[test]
    fn test_purge_is_idempotent() {
        let storage = Storage::in_memory();
        storage.purge_session_keys();
        storage.purge_session_keys();
    }
}
