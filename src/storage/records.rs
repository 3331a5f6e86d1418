//! Event and certificate records with integrity annotations

use super::codec;
use super::persistence::{PersistenceHelper, PersistenceResult, StorageCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const RECORD_VERSION: &str = "1.0";
pub const PLATFORM: &str = "mintmark";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    pub creator: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub event_date: u64,
    pub max_attendees: u64,
    #[serde(default)]
    pub poap_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: String,
    pub template: String,
    pub recipient: String,
    pub issue_date: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
}

impl CertificateRecord {
    /// Checksum over the identifying fields
    pub fn fingerprint(&self) -> String {
        let basis = format!("{}-{}-{}-{}", self.id, self.template, self.recipient, self.issue_date);
        codec::checksum(basis.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityInfo {
    pub redundancy: u8,
    pub targets: Vec<String>,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub immutable: bool,
}

/// Record as written to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord<T> {
    #[serde(flatten)]
    pub record: T,
    pub stored_at: DateTime<Utc>,
    pub version: String,
    pub platform: String,
    pub integrity: IntegrityInfo,
}

fn wrap<T: Serialize>(
    record: &T,
    category: StorageCategory,
    fingerprint: Option<String>,
) -> Result<StoredRecord<&T>, serde_json::Error> {
    let checksum = codec::checksum(&serde_json::to_vec(record)?);
    Ok(StoredRecord {
        record,
        stored_at: Utc::now(),
        version: RECORD_VERSION.to_string(),
        platform: PLATFORM.to_string(),
        integrity: IntegrityInfo {
            redundancy: category.redundancy(),
            targets: ["remote", "encoded", "local"].iter().map(|s| s.to_string()).collect(),
            checksum,
            immutable: fingerprint.is_some(),
            fingerprint,
        },
    })
}

impl PersistenceHelper {
    pub async fn store_event(&self, event: &EventRecord) -> PersistenceResult {
        let name = format!("event_{}.json", event.id);
        match wrap(event, StorageCategory::Event, None) {
            Ok(stored) => self.store_json(&name, &stored, StorageCategory::Event).await,
            Err(e) => PersistenceResult::serialization_failure(&name, &e),
        }
    }

    pub async fn store_certificate(&self, certificate: &CertificateRecord) -> PersistenceResult {
        let name = format!("certificate_{}.json", certificate.id);
        let fingerprint = Some(certificate.fingerprint());
        match wrap(certificate, StorageCategory::Certificate, fingerprint) {
            Ok(stored) => self.store_json(&name, &stored, StorageCategory::Certificate).await,
            Err(e) => PersistenceResult::serialization_failure(&name, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryStore;
    use crate::storage::persistence::PersistenceKeys;
    use std::sync::Arc;

    fn certificate() -> CertificateRecord {
        CertificateRecord {
            id: "c-1".into(),
            template: "gold".into(),
            recipient: "0xabc".into(),
            issue_date: "2024-05-01".into(),
            event_id: Some("e-1".into()),
            issuer: None,
        }
    }

    #[test]
    fn test_fingerprint_covers_identity_fields() {
        let a = certificate();
        let mut b = certificate();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.recipient = "0xdef".into();
        assert_ne!(a.fingerprint(), b.fingerprint());
        // fields outside the identity do not matter
        b = certificate();
        b.issuer = Some("someone".into());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[tokio::test]
    async fn test_store_certificate_round_trip() {
        let helper = PersistenceHelper::new(Arc::new(MemoryStore::new()));
        let cert = certificate();
        let result = helper.store_certificate(&cert).await;
        assert!(result.succeeded());

        let stored: StoredRecord<CertificateRecord> = helper.retrieve_json(&result.keys()).await.unwrap();
        assert_eq!(stored.record, cert);
        assert_eq!(stored.platform, PLATFORM);
        assert_eq!(stored.integrity.redundancy, 7);
        assert!(stored.integrity.immutable);
        assert_eq!(stored.integrity.fingerprint, Some(cert.fingerprint()));
        assert_eq!(
            stored.integrity.checksum,
            codec::checksum(&serde_json::to_vec(&cert).unwrap())
        );
    }

    #[tokio::test]
    async fn test_store_event_via_local_backup() {
        let helper = PersistenceHelper::new(Arc::new(MemoryStore::new()));
        let event = EventRecord {
            id: "42".into(),
            name: "Event A".into(),
            creator: "0x1".into(),
            description: String::new(),
            location: "Lisbon".into(),
            event_date: 1_714_521_600,
            max_attendees: 100,
            poap_enabled: true,
        };
        let result = helper.store_event(&event).await;
        let keys = PersistenceKeys {
            local_key: result.local_key().map(str::to_string),
            ..Default::default()
        };
        let stored: StoredRecord<EventRecord> = helper.retrieve_json(&keys).await.unwrap();
        assert_eq!(stored.record, event);
        assert_eq!(stored.integrity.redundancy, 5);
        assert!(stored.integrity.fingerprint.is_none());
        assert_eq!(helper.registry()[0].name, "event_42.json");
    }
}
