//! Key/value persistence standing in for the browser's local storage.
//!
//! Writes are best-effort: callers log failures and carry on, the same way
//! the UI ignores a full or disabled storage.

use crate::errors::{AppError, ResultExt};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use url::form_urlencoded;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
    fn keys(&self) -> Result<Vec<String>, AppError>;
}

/// Process-local storage, used by tests and short-lived sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::StorageError("memory storage lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, AppError> {
        let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One file per key under a directory.
///
/// Keys such as `availabilityVoluntario:42` are not valid file names
/// everywhere, so every character outside `[A-Za-z0-9_-]` is hex-escaped.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Creating storage dir {}", dir.display()))?;
        tracing::debug!("File storage opened at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// File-name-safe form of a storage key.
fn encode_key(key: &str) -> String {
    form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

fn decode_key(encoded: &str) -> String {
    // The encoded form never holds '&' or '=', so it parses as a single name.
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err::<Option<String>, _>(e)
                .with_context(|| format!("Reading storage key '{}'", key)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a half-written value.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("Writing storage key '{}'", key))?;
        fs::rename(&tmp, &path).with_context(|| format!("Committing storage key '{}'", key))
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err::<(), _>(e).with_context(|| format!("Removing storage key '{}'", key))
            }
        }
    }

    fn keys(&self) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.dir).context("Listing storage dir")?;
        for entry in entries {
            let entry = entry.context("Reading storage dir entry")?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                keys.push(decode_key(stem));
            }
        }
        keys.sort();
        Ok(keys)
    }
}
