//! Durable storage port for the persisted state slice
//!
//! The store hands this port an already serialized record and never cares
//! where it ends up. [`SledStorage`] keeps it in an embedded `sled` tree
//! under a single fixed key; [`MemoryStorage`] keeps it in process memory for
//! tests and throwaway runs.

use crate::error::{Result, RtaiError};
use sled::Db;
use std::path::Path;
use std::sync::Mutex;

/// Fixed key of the durable record
pub const STATE_KEY: &str = "rtai_webui_v1";

/// Load/save of the raw persisted record
#[cfg_attr(test, mockall::automock)]
pub trait StateStorage: Send + Sync {
    /// Raw record, or `None` if nothing was ever saved
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Storage` if the backend cannot be read
    fn load(&self) -> Result<Option<String>>;

    /// Replace the raw record
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Storage` if the write does not reach the backend
    fn save(&self, record: &str) -> Result<()>;
}

/// Embedded `sled` database holding the record under [`STATE_KEY`]
pub struct SledStorage {
    db: Db,
}

impl SledStorage {
    /// Open or create the database directory
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database directory
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use rtai::state::storage::{SledStorage, StateStorage};
    ///
    /// # fn main() -> rtai::error::Result<()> {
    /// let dir = tempfile::tempdir()?;
    /// let storage = SledStorage::open(dir.path().join("state"))?;
    /// assert!(storage.load()?.is_none());
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            RtaiError::Storage(format!(
                "Failed to open state database {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::debug!(path = %path.display(), "Opened state database");
        Ok(Self { db })
    }
}

impl StateStorage for SledStorage {
    fn load(&self) -> Result<Option<String>> {
        let bytes = self
            .db
            .get(STATE_KEY)
            .map_err(|e| RtaiError::Storage(format!("Get failed: {}", e)))?;
        match bytes {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| RtaiError::Storage(format!("Record is not UTF-8: {}", e)))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    fn save(&self, record: &str) -> Result<()> {
        self.db
            .insert(STATE_KEY, record.as_bytes())
            .map_err(|e| RtaiError::Storage(format!("Insert failed: {}", e)))?;

        self.db
            .flush()
            .map_err(|e| RtaiError::Storage(format!("Flush failed: {}", e)))?;

        Ok(())
    }
}

/// Process-local storage; contents die with the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    record: Mutex<Option<String>>,
}

impl MemoryStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a raw record
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(record.into())),
        }
    }

    /// Current raw record
    pub fn snapshot(&self) -> Option<String> {
        self.record.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .record
            .lock()
            .map_err(|_| RtaiError::Storage("Memory storage lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, record: &str) -> Result<()> {
        let mut guard = self
            .record
            .lock()
            .map_err(|_| RtaiError::Storage("Memory storage lock poisoned".into()))?;
        *guard = Some(record.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sled_round_trip_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        {
            let storage = SledStorage::open(&path).unwrap();
            assert!(storage.load().unwrap().is_none());
            storage.save(r#"{"schema":"rtai_webui_v1"}"#).unwrap();
            storage.save(r#"{"schema":"rtai_webui_v1","sessionId":"s-2"}"#).unwrap();
        }
        let storage = SledStorage::open(&path).unwrap();
        let record = storage.load().unwrap().unwrap();
        assert!(record.contains("s-2"));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_record("x");
        assert_eq!(storage.load().unwrap().as_deref(), Some("x"));
        storage.save("y").unwrap();
        assert_eq!(storage.snapshot().as_deref(), Some("y"));
    }
}
