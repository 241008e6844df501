//! Durable credential persistence.
//!
//! All providers share one JSON services document, rewritten whole on every
//! mutation. Writes go through a temp file and rename so an interrupted
//! process never leaves a half-written document behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialRecord;
use crate::error::AuthError;

const DOCUMENT_VERSION: u32 = 1;

/// Storage abstraction over the provider → credential map.
pub trait CredentialStore: Send + Sync {
    fn get(&self, provider: &str) -> Option<CredentialRecord>;
    fn upsert(&self, provider: &str, record: CredentialRecord) -> Result<(), AuthError>;
    /// Returns whether a record existed.
    fn remove(&self, provider: &str) -> Result<bool, AuthError>;
    fn all(&self) -> HashMap<String, CredentialRecord>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ServicesDocument {
    version: u32,
    services: HashMap<String, CredentialRecord>,
}

/// File-backed credential store.
///
/// The document is loaded once at construction and the in-memory map stays
/// the working copy for the life of the store. Every mutation re-reads the
/// document, merges, and rewrites it atomically under a store-wide lock, so
/// concurrent authorize flows for different providers never lose each
/// other's records. When the disk write fails the in-memory record is kept,
/// the caller is told via [`AuthError::Store`], and reads keep working for
/// the rest of the process.
///
/// # Example
/// ```no_run
/// use wizard_auth::{CredentialStore, FileCredentialStore};
///
/// let store = FileCredentialStore::new("/tmp/services.json");
/// assert!(store.get("real_debrid").is_none());
/// ```
pub struct FileCredentialStore {
    path: PathBuf,
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = read_document(&path);
        Self {
            path,
            records: Mutex::new(records),
        }
    }

    /// Store at the conventional per-user location,
    /// `~/.wizard-auth/services.json`.
    pub fn new_default() -> Self {
        Self::new(default_services_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read → merge → atomic write, with the lock already held.
    /// In-memory entries win over disk so a record that previously failed to
    /// persist is retried rather than dropped.
    fn persist(&self, records: &HashMap<String, CredentialRecord>) -> Result<(), AuthError> {
        let document = ServicesDocument {
            version: DOCUMENT_VERSION,
            services: records.clone(),
        };
        let serialized = serde_json::to_string_pretty(&document)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "services document saved");
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, provider: &str) -> Option<CredentialRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(provider).cloned())
    }

    fn upsert(&self, provider: &str, record: CredentialRecord) -> Result<(), AuthError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AuthError::Store("credential store lock poisoned".to_string()))?;
        let mut merged = read_document(&self.path);
        merged.extend(records.drain());
        merged.insert(provider.to_string(), record);
        let result = self.persist(&merged);
        *records = merged;
        result
    }

    fn remove(&self, provider: &str) -> Result<bool, AuthError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AuthError::Store("credential store lock poisoned".to_string()))?;
        let mut merged = read_document(&self.path);
        merged.extend(records.drain());
        let existed = merged.remove(provider).is_some();
        let result = if existed {
            self.persist(&merged)
        } else {
            Ok(())
        };
        *records = merged;
        result.map(|()| existed)
    }

    fn all(&self) -> HashMap<String, CredentialRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

/// A missing or corrupt document is an empty map, not a fatal error: sibling
/// providers' records should never be lost to one bad read.
fn read_document(path: &Path) -> HashMap<String, CredentialRecord> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "services document unreadable, starting empty");
            return HashMap::new();
        }
    };
    match serde_json::from_str::<ServicesDocument>(&raw) {
        Ok(document) => document.services,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "services document corrupt, starting empty");
            HashMap::new()
        }
    }
}

fn default_services_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".wizard-auth"))
        .unwrap_or_else(|| PathBuf::from(".wizard-auth"))
        .join("services.json")
}
