//! JSON-file backed storage.
//!
//! Lets a headless host keep the opt-out flag and the visitor cookie across
//! process runs. The whole map is rewritten on every `set`; these stores hold
//! a handful of keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::{CookieJar, Storage};
use crate::cookie::SetCookie;
use crate::error::{Result, TrackerError};

pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`, starting empty when the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let items = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                TrackerError::Storage(format!("corrupt store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(TrackerError::Storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!(path = %path.display(), keys = items.len(), "Opened file storage");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let contents = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, contents).map_err(|e| {
            TrackerError::Storage(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock();
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }
}

impl CookieJar for FileStorage {
    fn get(&self, name: &str) -> Option<String> {
        Storage::get(self, name)
    }

    fn set(&self, cookie: &SetCookie) -> Result<()> {
        Storage::set(self, &cookie.name, &cookie.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("seline-file-storage-{}-{}", std::process::id(), name))
            .join("store.json")
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let store = FileStorage::open(temp_path("missing")).unwrap();
        assert_eq!(Storage::get(&store, "anything"), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_path("reopen");
        let _ = fs::remove_file(&path);

        let store = FileStorage::open(&path).unwrap();
        Storage::set(&store, "seline-do-not-track", "1").unwrap();
        CookieJar::set(&store, &SetCookie::visitor("vid-1", None, Utc::now())).unwrap();

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(Storage::get(&reopened, "seline-do-not-track"), Some("1".into()));
        assert_eq!(CookieJar::get(&reopened, "seline_vid"), Some("vid-1".into()));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let err = FileStorage::open(&path).err().unwrap();
        assert!(matches!(err, TrackerError::Storage(_)));

        let _ = fs::remove_file(&path);
    }
}
