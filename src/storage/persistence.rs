//! Best-effort persistence across three independent targets.
//!
//! Every call attempts the remote store, an encoded copy and a local backup,
//! in that order, and succeeds when at least one of them lands. Target
//! failures are recorded in the result instead of being raised.

use super::codec::{self, EncodedBlob};
use super::kv::KeyValueStore;
use super::remote::{RemoteReceipt, RemoteStore};
use super::storage_errors::StorageError;
use crate::metrics::metrics;
use crate::observability::TraceContext;
use crate::structured_logging::StructuredLogger;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

pub const ENCODED_PREFIX: &str = "encoded_";
pub const META_PREFIX: &str = "meta_";
pub const BACKUP_PREFIX: &str = "secure_file_";
pub const REGISTRY_KEY: &str = "secure_file_registry";

/// Data to persist, already serialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl Payload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Structured value serialized to JSON text
    pub fn json<T: Serialize + ?Sized>(name: impl Into<String>, value: &T) -> Result<Self, StorageError> {
        Ok(Self::new(name, "application/json", serde_json::to_vec(value)?))
    }

    pub fn blob(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, "application/octet-stream", bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Kind of data being stored; drives the redundancy hint sent to the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageCategory {
    #[default]
    Generic,
    Event,
    Certificate,
}

impl StorageCategory {
    pub fn redundancy(&self) -> u8 {
        match self {
            Self::Generic | Self::Event => 5,
            Self::Certificate => 7,
        }
    }
}

impl std::str::FromStr for StorageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Self::Generic),
            "event" => Ok(Self::Event),
            "certificate" => Ok(Self::Certificate),
            other => Err(format!("unknown storage category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTarget {
    Remote,
    Encoded,
    Local,
}

impl StorageTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Encoded => "encoded",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which targets accepted the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetStatus {
    pub remote: bool,
    pub encoded: bool,
    pub local: bool,
}

impl TargetStatus {
    pub fn any(&self) -> bool {
        self.remote || self.encoded || self.local
    }

    pub fn landed(&self) -> Vec<&'static str> {
        [
            (self.remote, StorageTarget::Remote),
            (self.encoded, StorageTarget::Encoded),
            (self.local, StorageTarget::Local),
        ]
        .into_iter()
        .filter(|(ok, _)| *ok)
        .map(|(_, t)| t.as_str())
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceFailure {
    /// Some targets failed, at least one holds the payload
    Partial,
    /// No target holds the payload
    Total,
}

/// Handles to every copy of a stored payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,
}

impl PersistenceKeys {
    pub fn is_empty(&self) -> bool {
        self.remote_hash.is_none() && self.encoded_digest.is_none() && self.local_key.is_none()
    }
}

/// Outcome of one [`PersistenceHelper::store_secure`] call.
///
/// `succeeded` is true iff at least one target landed, and each key is
/// present iff its target landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistenceResult {
    succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoded_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_key: Option<String>,
    target_status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl PersistenceResult {
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn remote_hash(&self) -> Option<&str> {
        self.remote_hash.as_deref()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    pub fn encoded_digest(&self) -> Option<&str> {
        self.encoded_digest.as_deref()
    }

    pub fn local_key(&self) -> Option<&str> {
        self.local_key.as_deref()
    }

    pub fn target_status(&self) -> TargetStatus {
        self.target_status
    }

    /// Every failed target, `; `-separated
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn keys(&self) -> PersistenceKeys {
        PersistenceKeys {
            remote_hash: self.remote_hash.clone(),
            encoded_digest: self.encoded_digest.clone(),
            local_key: self.local_key.clone(),
        }
    }

    /// Nothing was attempted because the value could not be serialized
    pub(crate) fn serialization_failure(name: &str, error: &dyn fmt::Display) -> Self {
        warn!(name = %name, error = %error, "Could not serialize payload");
        metrics().storage_calls.inc();
        metrics().storage_total_failures.inc();
        Self {
            succeeded: false,
            remote_hash: None,
            remote_url: None,
            encoded_digest: None,
            local_key: None,
            target_status: TargetStatus::default(),
            error_message: Some(format!("serialization: {}", error)),
        }
    }

    pub fn failure(&self) -> Option<PersistenceFailure> {
        let status = self.target_status;
        if !status.any() {
            Some(PersistenceFailure::Total)
        } else if status.remote && status.encoded && status.local {
            None
        } else {
            Some(PersistenceFailure::Partial)
        }
    }
}

/// Sidecar record written next to each encoded copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMetadata {
    pub name: String,
    pub original_size: usize,
    pub encoded_size: usize,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    pub category: StorageCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackupRecord {
    name: String,
    content_type: String,
    size: usize,
    data: String,
    category: StorageCategory,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoded_digest: Option<String>,
}

/// One line of the backup registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: String,
    pub name: String,
    pub size: usize,
    pub timestamp: DateTime<Utc>,
    pub category: StorageCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    pub remote_available: bool,
    pub encoded_entries: usize,
    pub encoded_bytes: usize,
    pub backup_entries: usize,
    pub total_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_percent: Option<f64>,
}

/// Writes payloads to every configured target
pub struct PersistenceHelper {
    kv: Arc<dyn KeyValueStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    // serializes read-modify-write of the registry entry
    registry_lock: Mutex<()>,
}

impl PersistenceHelper {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            remote: None,
            registry_lock: Mutex::new(()),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub async fn store_secure(&self, payload: &Payload) -> PersistenceResult {
        self.store_with_category(payload, StorageCategory::Generic).await
    }

    pub async fn store_json<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
        category: StorageCategory,
    ) -> PersistenceResult {
        match Payload::json(name, value) {
            Ok(payload) => self.store_with_category(&payload, category).await,
            Err(e) => PersistenceResult::serialization_failure(name, &e),
        }
    }

    /// Attempt all three targets; never fails outright
    pub async fn store_with_category(&self, payload: &Payload, category: StorageCategory) -> PersistenceResult {
        let ctx = TraceContext::new("store_secure");
        let logger = StructuredLogger::for_context(&ctx);
        self.store_all(payload, category, &logger)
            .instrument(ctx.span())
            .await
    }

    async fn store_all(
        &self,
        payload: &Payload,
        category: StorageCategory,
        logger: &StructuredLogger,
    ) -> PersistenceResult {
        let m = metrics();
        m.storage_calls.inc();

        let mut status = TargetStatus::default();
        let mut errors: Vec<String> = Vec::new();
        let mut fail = |target: StorageTarget, error: String| {
            logger.log_target(target.as_str(), false, Some(&error));
            errors.push(format!("{}: {}", target, error));
        };

        let receipt = match self.store_remote(payload, category).await {
            Ok(receipt) => {
                status.remote = true;
                m.storage_remote_ok.inc();
                logger.log_target("remote", true, Some(&receipt.hash));
                Some(receipt)
            }
            Err(e) => {
                m.storage_remote_failed.inc();
                fail(StorageTarget::Remote, e);
                None
            }
        };
        let remote_hash = receipt.as_ref().map(|r| r.hash.clone());

        // One envelope serves both local targets
        let blob = codec::encode(payload.bytes()).map_err(|e| e.to_string());

        let encoded_digest = match &blob {
            Ok(blob) => self.store_encoded(blob, payload, category, remote_hash.as_deref()),
            Err(e) => Err(e.clone()),
        };
        let encoded_digest = match encoded_digest {
            Ok(digest) => {
                status.encoded = true;
                m.storage_encoded_ok.inc();
                logger.log_target("encoded", true, Some(&digest));
                Some(digest)
            }
            Err(e) => {
                m.storage_encoded_failed.inc();
                fail(StorageTarget::Encoded, e);
                None
            }
        };

        let local_key = match &blob {
            Ok(blob) => self.store_backup(blob, payload, category, remote_hash.as_deref(), encoded_digest.as_deref()),
            Err(e) => Err(e.clone()),
        };
        let local_key = match local_key {
            Ok(key) => {
                status.local = true;
                m.storage_local_ok.inc();
                logger.log_target("local", true, Some(&key));
                Some(key)
            }
            Err(e) => {
                m.storage_local_failed.inc();
                fail(StorageTarget::Local, e);
                None
            }
        };

        let succeeded = status.any();
        if !succeeded {
            m.storage_total_failures.inc();
        }
        logger.log_store_summary(succeeded, &status.landed());

        let (remote_hash, remote_url) = match receipt {
            Some(RemoteReceipt { hash, url }) => (Some(hash), url),
            None => (None, None),
        };

        PersistenceResult {
            succeeded,
            remote_hash,
            remote_url,
            encoded_digest,
            local_key,
            target_status: status,
            error_message: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }
    }

    async fn store_remote(&self, payload: &Payload, category: StorageCategory) -> Result<RemoteReceipt, String> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| "remote store not configured".to_string())?;
        remote
            .upload(
                payload.name(),
                payload.content_type(),
                payload.bytes().to_vec(),
                category.redundancy(),
            )
            .await
            .map_err(|e| e.to_string())
    }

    fn store_encoded(
        &self,
        blob: &EncodedBlob,
        payload: &Payload,
        category: StorageCategory,
        remote_hash: Option<&str>,
    ) -> Result<String, String> {
        let digest = codec::digest(&blob.encoded);
        self.kv
            .set(&format!("{}{}", ENCODED_PREFIX, digest), &blob.encoded)
            .map_err(|e| e.to_string())?;

        let meta = EncodedMetadata {
            name: payload.name().to_string(),
            original_size: blob.original_size,
            encoded_size: blob.encoded.len(),
            timestamp: blob.created_at,
            checksum: blob.checksum.clone(),
            category,
            remote_hash: remote_hash.map(str::to_string),
        };
        // The encoded copy is retrievable without its sidecar
        let written = serde_json::to_string(&meta)
            .map_err(StorageError::from)
            .and_then(|json| self.kv.set(&format!("{}{}", META_PREFIX, digest), &json));
        if let Err(e) = written {
            warn!(digest = %digest, error = %e, "Failed to write encoded metadata");
        }
        Ok(digest)
    }

    fn store_backup(
        &self,
        blob: &EncodedBlob,
        payload: &Payload,
        category: StorageCategory,
        remote_hash: Option<&str>,
        encoded_digest: Option<&str>,
    ) -> Result<String, String> {
        let key = backup_key(blob.created_at);
        let record = BackupRecord {
            name: payload.name().to_string(),
            content_type: payload.content_type().to_string(),
            size: blob.original_size,
            data: blob.encoded.clone(),
            category,
            timestamp: blob.created_at,
            remote_hash: remote_hash.map(str::to_string),
            encoded_digest: encoded_digest.map(str::to_string),
        };
        let json = serde_json::to_string(&record).map_err(|e| e.to_string())?;
        self.kv.set(&key, &json).map_err(|e| e.to_string())?;

        let entry = RegistryEntry {
            key: key.clone(),
            name: record.name,
            size: record.size,
            timestamp: record.timestamp,
            category,
        };
        if let Err(e) = self.append_registry(entry) {
            // Unlisted backups are invisible to registry(); undo the write
            if let Err(undo) = self.kv.remove(&key) {
                warn!(key = %key, error = %undo, "Failed to remove unregistered backup");
            }
            return Err(format!("registry update failed: {}", e));
        }
        Ok(key)
    }

    fn append_registry(&self, entry: RegistryEntry) -> Result<(), StorageError> {
        let _guard = self.registry_lock.lock();
        // A registry that cannot be read must not be replaced by a shorter one
        let mut entries: Vec<RegistryEntry> = match self.kv.get(REGISTRY_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        entries.push(entry);
        let json = serde_json::to_string(&entries)?;
        self.kv.set(REGISTRY_KEY, &json)
    }

    fn read_registry(&self) -> Vec<RegistryEntry> {
        match self.kv.get(REGISTRY_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(error = %e, "Backup registry is corrupt, starting a new one");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read backup registry");
                Vec::new()
            }
        }
    }

    /// Backup entries in insertion order
    pub fn registry(&self) -> Vec<RegistryEntry> {
        self.read_registry()
    }

    /// Read a payload back, trying remote, then encoded, then local.
    ///
    /// Returns `None` when every provided key misses or fails.
    pub async fn retrieve(&self, keys: &PersistenceKeys) -> Option<Vec<u8>> {
        if let (Some(hash), Some(remote)) = (keys.remote_hash.as_deref(), self.remote.as_ref()) {
            if remote.is_configured() {
                match remote.retrieve(hash).await {
                    Ok(bytes) => {
                        debug!(hash = %hash, "Retrieved from remote store");
                        return Some(bytes);
                    }
                    Err(e) => warn!(hash = %hash, error = %e, "Remote retrieval failed"),
                }
            }
        }

        if let Some(digest) = keys.encoded_digest.as_deref() {
            match self.retrieve_encoded(digest) {
                Ok(Some(bytes)) => return Some(bytes),
                Ok(None) => debug!(digest = %digest, "No encoded copy"),
                Err(e) => warn!(digest = %digest, error = %e, "Encoded retrieval failed"),
            }
        }

        if let Some(key) = keys.local_key.as_deref() {
            match self.retrieve_backup(key) {
                Ok(Some(bytes)) => return Some(bytes),
                Ok(None) => debug!(key = %key, "No local backup"),
                Err(e) => warn!(key = %key, error = %e, "Local retrieval failed"),
            }
        }

        None
    }

    pub async fn retrieve_json<T: DeserializeOwned>(&self, keys: &PersistenceKeys) -> Option<T> {
        let bytes = self.retrieve(keys).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Retrieved payload is not valid JSON for the requested type");
                None
            }
        }
    }

    fn retrieve_encoded(&self, digest: &str) -> Result<Option<Vec<u8>>, String> {
        let Some(encoded) = self
            .kv
            .get(&format!("{}{}", ENCODED_PREFIX, digest))
            .map_err(|e| e.to_string())?
        else {
            return Ok(None);
        };
        let decoded = codec::decode(&encoded).map_err(|e| e.to_string())?;
        Ok(Some(decoded.bytes))
    }

    fn retrieve_backup(&self, key: &str) -> Result<Option<Vec<u8>>, String> {
        let Some(json) = self.kv.get(key).map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        let record: BackupRecord = serde_json::from_str(&json).map_err(|e| e.to_string())?;
        let decoded = codec::decode(&record.data).map_err(|e| e.to_string())?;
        Ok(Some(decoded.bytes))
    }

    /// Sidecar metadata of an encoded copy
    pub fn metadata(&self, digest: &str) -> Option<EncodedMetadata> {
        let json = self.kv.get(&format!("{}{}", META_PREFIX, digest)).ok()??;
        serde_json::from_str(&json).ok()
    }

    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        let mut encoded_entries = 0;
        let mut encoded_bytes = 0;
        let mut backup_entries = 0;

        for key in self.kv.keys()? {
            if key.starts_with(ENCODED_PREFIX) {
                encoded_entries += 1;
                encoded_bytes += self.kv.get(&key)?.map(|v| v.len()).unwrap_or(0);
            } else if key.starts_with(BACKUP_PREFIX) && key != REGISTRY_KEY {
                backup_entries += 1;
            }
        }

        let total_bytes = self.kv.used_bytes()?;
        let quota_bytes = self.kv.quota_bytes();
        let usage_percent = quota_bytes
            .filter(|q| *q > 0)
            .map(|q| (total_bytes as f64 / q as f64 * 10_000.0).round() / 100.0);

        Ok(StorageStats {
            remote_available: self.remote.as_ref().map(|r| r.is_available()).unwrap_or(false),
            encoded_entries,
            encoded_bytes,
            backup_entries,
            total_bytes,
            quota_bytes,
            usage_percent,
        })
    }
}

fn backup_key(now: DateTime<Utc>) -> String {
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
        .take(10)
        .collect::<String>()
        .to_lowercase();
    format!("{}{}_{}", BACKUP_PREFIX, now.timestamp_millis(), suffix)
}
