//! Client-side key-value storage for the API key and PKCE artifacts.
//!
//! The file-backed store lives at `~/.local/share/router-chat/storage.json`
//! following the XDG Base Directory Specification.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::StorageError;

/// Storage key holding the OpenRouter API key.
pub const API_KEY_STORAGE_KEY: &str = "openrouter_key";
/// Storage key holding the PKCE code verifier between redirect and exchange.
pub const CODE_VERIFIER_STORAGE_KEY: &str = "openrouter_code_verifier";
/// Storage key holding the OAuth state between redirect and callback.
pub const STATE_STORAGE_KEY: &str = "openrouter_oauth_state";

/// A string-to-string store with explicit get/set/remove.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// The stored API key. An empty string counts as no key.
    fn api_key(&self) -> Option<String> {
        self.get(API_KEY_STORAGE_KEY).filter(|k| !k.is_empty())
    }

    fn set_api_key(&mut self, key: &str) -> Result<(), StorageError> {
        self.set(API_KEY_STORAGE_KEY, key)
    }

    fn clear_api_key(&mut self) -> Result<(), StorageError> {
        self.remove(API_KEY_STORAGE_KEY)
    }
}

/// In-memory store, used by tests and one-shot sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON-file-backed store. Every mutation is written through to disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Get the default storage path.
    ///
    /// Returns `~/.local/share/router-chat/storage.json` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("router-chat").join("storage.json"))
    }

    /// Open the store at `path`.
    ///
    /// A missing file yields an empty store; the file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = if path.exists() {
            let file = File::open(&path).map_err(|source| io_error(&path, source))?;
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                StorageError::Corrupt {
                    path: path.display().to_string(),
                    source,
                }
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all entries to disk with 0600 permissions on Unix.
    fn save(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }

        let file = File::create(&self.path).map_err(|source| io_error(&self.path, source))?;

        #[cfg(unix)]
        {
            let mut perms = file
                .metadata()
                .map_err(|source| io_error(&self.path, source))?
                .permissions();
            perms.set_mode(0o600);
            file.set_permissions(perms)
                .map_err(|source| io_error(&self.path, source))?;
        }

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.entries).map_err(|source| {
            StorageError::Corrupt {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        writer.flush().map_err(|source| io_error(&self.path, source))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.entries.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
