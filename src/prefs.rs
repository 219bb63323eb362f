use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

type Entries = Map<String, Value>;

/// Flat string/bool/int key-value store persisted as a single JSON object.
///
/// Keys are case-sensitive. Every mutation rewrites the whole file; the store
/// is small and written a handful of times per install.
pub struct PreferenceStore {
    path: PathBuf,
    data: RwLock<Entries>,
}

impl PreferenceStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
            // A corrupt file is treated like a fresh install.
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            Entries::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.read()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Missing or non-boolean entries read as `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.read().get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.read().get(key).and_then(Value::as_i64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    /// Applies several changes under one lock and persists them with a single write.
    pub fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Entries),
    {
        let mut guard = self.write();
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write preferences to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("preferences.json");

        let store = PreferenceStore::new(path.clone()).expect("open");
        store.set("StartMenu.Menu", "https://x.test/menu").expect("set");
        store.set("StartMenu.AlwaysAppMode", true).expect("set");
        store.set("dailyGoal", 35).expect("set");
        drop(store);

        let reopened = PreferenceStore::new(path).expect("reopen");
        assert_eq!(
            reopened.get_string("StartMenu.Menu").as_deref(),
            Some("https://x.test/menu")
        );
        assert!(reopened.get_bool("StartMenu.AlwaysAppMode"));
        assert_eq!(reopened.get_i64("dailyGoal"), Some(35));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PreferenceStore::new(dir.path().join("p.json")).expect("open");
        store.set("StartMenu.Menu", "a").expect("set");
        assert!(store.get_string("startmenu.menu").is_none());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("p.json");
        fs::write(&path, "{not json").expect("write");

        let store = PreferenceStore::new(path).expect("open");
        assert!(!store.contains("anything"));
        assert!(!store.get_bool("StartMenu.AlwaysAppMode"));
    }

    #[test]
    fn remove_deletes_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PreferenceStore::new(dir.path().join("p.json")).expect("open");
        store.set("k", "v").expect("set");
        store.remove("k").expect("remove");
        assert!(!store.contains("k"));
    }
}
