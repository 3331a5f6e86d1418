//! Persistence helper and its storage targets

pub mod codec;
mod kv;
mod persistence;
mod records;
mod remote;
mod storage_errors;

pub use kv::{KeyValueStore, MemoryStore, SledStore, DEFAULT_QUOTA_BYTES};
pub use persistence::{
    EncodedMetadata, Payload, PersistenceFailure, PersistenceHelper, PersistenceKeys, PersistenceResult,
    RegistryEntry, StorageCategory, StorageStats, StorageTarget, TargetStatus, BACKUP_PREFIX, ENCODED_PREFIX,
    META_PREFIX, REGISTRY_KEY,
};
pub use records::{CertificateRecord, EventRecord, IntegrityInfo, StoredRecord, PLATFORM, RECORD_VERSION};
pub use remote::{HttpRemoteStore, RemoteReceipt, RemoteStore};
pub use storage_errors::{CodecError, RemoteStoreError, StorageError};
