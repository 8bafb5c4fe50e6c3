// src/storage.rs
//
// Key-value blob persistence. The core only ever sees opaque bytes under a
// handful of fixed keys; JSON is the encoding.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CALIBRATION_KEY: &str = "calibration_data";
pub const THRESHOLDS_KEY: &str = "adaptive_thresholds";
pub const PATTERNS_KEY: &str = "learned_gestures";
pub const COUNTERS_KEY: &str = "learning_counters";

pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per blob under a directory.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

/// In-process store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.blobs.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.blobs.lock().remove(key);
        Ok(())
    }
}

pub fn save_json<T: Serialize + ?Sized>(store: &dyn BlobStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).with_context(|| format!("Failed to encode {}", key))?;
    store.put(key, &bytes)?;
    debug!("💾 Saved {} ({} bytes)", key, bytes.len());
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Result<Option<T>> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(&bytes).with_context(|| format!("Failed to decode {}", key))?;
    Ok(Some(value))
}

/// Missing blobs give the default silently; unreadable ones are logged first.
pub fn load_json_or_default<T: DeserializeOwned + Default>(store: &dyn BlobStore, key: &str) -> T {
    match load_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!("⚠️  Falling back to defaults for {}: {:#}", key, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("state")).unwrap();

        let mut counters = BTreeMap::new();
        counters.insert("training_data_count".to_string(), 42u64);
        save_json(&store, COUNTERS_KEY, &counters).unwrap();

        let back: BTreeMap<String, u64> = load_json(&store, COUNTERS_KEY).unwrap().unwrap();
        assert_eq!(back, counters);
        assert!(store.dir().join("learning_counters.json").exists());

        store.remove(COUNTERS_KEY).unwrap();
        assert!(store.get(COUNTERS_KEY).unwrap().is_none());
        // Removing twice is fine
        store.remove(COUNTERS_KEY).unwrap();
    }

    #[test]
    fn test_corrupt_blob_falls_back_to_default() {
        let store = MemoryBlobStore::new();
        store.put(THRESHOLDS_KEY, b"{not json").unwrap();

        assert!(load_json::<BTreeMap<String, f32>>(&store, THRESHOLDS_KEY).is_err());
        let fallback: BTreeMap<String, f32> = load_json_or_default(&store, THRESHOLDS_KEY);
        assert!(fallback.is_empty());
    }

    #[test]
    fn test_missing_blob_is_none() {
        let store = MemoryBlobStore::new();
        assert!(load_json::<Vec<u8>>(&store, PATTERNS_KEY).unwrap().is_none());
    }
}
