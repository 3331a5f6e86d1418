//! Local key/value stores backing the encoded and backup targets

use super::storage_errors::StorageError;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Default quota, matching a typical browser origin's local storage
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Synchronous string key/value store.
///
/// Writes may fail, e.g. with [`StorageError::QuotaExceeded`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Sum of key and value lengths in bytes
    fn used_bytes(&self) -> Result<usize, StorageError> {
        let mut total = 0;
        for key in self.keys()? {
            let value = self.get(&key)?.unwrap_or_default();
            total += key.len() + value.len();
        }
        Ok(total)
    }

    fn quota_bytes(&self) -> Option<usize> {
        None
    }
}

fn check_quota(
    quota: Option<usize>,
    used: usize,
    replaced: usize,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let requested = key.len() + value.len();
    let available = quota.saturating_sub(used.saturating_sub(replaced));
    if requested > available {
        return Err(StorageError::QuotaExceeded {
            requested,
            available,
        });
    }
    Ok(())
}

/// In-process store with an optional byte quota
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: Some(quota_bytes),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: None,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        let used: usize = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        let replaced = entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        check_quota(self.quota, used, replaced, key, value)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn used_bytes(&self) -> Result<usize, StorageError> {
        Ok(self.entries.read().iter().map(|(k, v)| k.len() + v.len()).sum())
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota
    }
}

/// Durable store on an embedded sled database.
///
/// Writes go through `used`, a running byte count, so the quota check and
/// the write it guards are one step.
pub struct SledStore {
    db: sled::Db,
    quota: Option<usize>,
    used: Mutex<usize>,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let used = Self::scan_bytes(&db)?;
        debug!(path = %path.display(), used_bytes = used, "Opened sled store");
        Ok(Self {
            db,
            quota: None,
            used: Mutex::new(used),
        })
    }

    /// Scratch database removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            quota: None,
            used: Mutex::new(0),
        })
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota = Some(quota_bytes);
        self
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn scan_bytes(db: &sled::Db) -> Result<usize, StorageError> {
        let mut total = 0;
        for entry in db.iter() {
            let (k, v) = entry?;
            total += k.len() + v.len();
        }
        Ok(total)
    }

    fn decode_value(key: &str, raw: &[u8]) -> Result<String, StorageError> {
        String::from_utf8(raw.to_vec())
            .map_err(|e| StorageError::Serialization(format!("value for {key} is not UTF-8: {e}")))
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.db.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::decode_value(key, &raw)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut used = self.used.lock();
        let replaced = self
            .db
            .get(key.as_bytes())?
            .map(|v| key.len() + v.len())
            .unwrap_or(0);
        check_quota(self.quota, *used, replaced, key, value)?;
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        *used = used.saturating_sub(replaced) + key.len() + value.len();
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut used = self.used.lock();
        if let Some(old) = self.db.remove(key.as_bytes())? {
            *used = used.saturating_sub(key.len() + old.len());
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.db
            .iter()
            .keys()
            .map(|k| -> Result<String, StorageError> {
                let k = k?;
                Ok(String::from_utf8_lossy(&k).into_owned())
            })
            .collect()
    }

    fn used_bytes(&self) -> Result<usize, StorageError> {
        Ok(*self.used.lock())
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota
    }
}
