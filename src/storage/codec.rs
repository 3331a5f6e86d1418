//! Self-describing text envelope for stored payloads.
//!
//! `base64(json{data: base64(bytes), timestamp, checksum, size})`. The
//! checksum is a 32-bit rolling hash: it catches accidental corruption and
//! nothing else. A mismatch on decode is reported but does not block the data.

use super::storage_errors::CodecError;
use crate::metrics::metrics;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    data: String,
    timestamp: i64,
    checksum: String,
    size: usize,
}

/// Result of [`encode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    pub encoded: String,
    pub checksum: String,
    pub original_size: usize,
    pub created_at: DateTime<Utc>,
}

/// Result of [`decode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlob {
    pub bytes: Vec<u8>,
    pub checksum_ok: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// `hash = hash * 31 + byte` over 32-bit wrapping arithmetic, rendered in base 36
pub fn checksum(data: &[u8]) -> String {
    let mut hash: i32 = 0;
    for &b in data {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(b as i32);
    }
    to_base36(hash.unsigned_abs() as u64)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Hex SHA-256 of the encoded form; used as its storage key
pub fn digest(encoded: &str) -> String {
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

pub fn encode(bytes: &[u8]) -> Result<EncodedBlob, CodecError> {
    encode_at(bytes, Utc::now())
}

pub fn encode_at(bytes: &[u8], now: DateTime<Utc>) -> Result<EncodedBlob, CodecError> {
    let sum = checksum(bytes);
    let envelope = Envelope {
        data: STANDARD.encode(bytes),
        timestamp: now.timestamp_millis(),
        checksum: sum.clone(),
        size: bytes.len(),
    };
    let encoded = STANDARD.encode(serde_json::to_vec(&envelope)?);
    Ok(EncodedBlob {
        encoded,
        checksum: sum,
        original_size: bytes.len(),
        created_at: now,
    })
}

pub fn decode(encoded: &str) -> Result<DecodedBlob, CodecError> {
    let raw = STANDARD.decode(encoded.trim())?;
    let envelope: Envelope = serde_json::from_slice(&raw)?;
    let bytes = STANDARD.decode(&envelope.data)?;

    let recomputed = checksum(&bytes);
    let checksum_ok = recomputed == envelope.checksum;
    if !checksum_ok {
        metrics().checksum_mismatches.inc();
        warn!(
            stored = %envelope.checksum,
            recomputed = %recomputed,
            "Data integrity check failed"
        );
    }
    if envelope.size != bytes.len() {
        warn!(stored = envelope.size, actual = bytes.len(), "Envelope size mismatch");
    }

    Ok(DecodedBlob {
        bytes,
        checksum_ok,
        created_at: Utc.timestamp_millis_opt(envelope.timestamp).single(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_checksum_known_values() {
        assert_eq!(checksum(b""), "0");
        // 'a' = 97 -> "2p" in base 36
        assert_eq!(checksum(b"a"), "2p");
        // 97 * 31 + 98 = 3105
        assert_eq!(checksum(b"ab"), to_base36(3105));
    }

    #[test]
    fn test_checksum_wraps_without_panicking() {
        let long = vec![0xffu8; 10_000];
        assert!(!checksum(&long).is_empty());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u32::MAX as u64 + 1), "1z141z4");
    }

    #[test]
    fn test_round_trip_preserves_bytes_and_timestamp() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let blob = encode_at(br#"{"name":"Event A"}"#, now).unwrap();
        let decoded = decode(&blob.encoded).unwrap();
        assert_eq!(decoded.bytes, br#"{"name":"Event A"}"#);
        assert!(decoded.checksum_ok);
        assert_eq!(decoded.created_at, Some(now));
        assert_eq!(blob.original_size, 18);
    }

    #[test]
    fn test_checksum_mismatch_still_returns_data() {
        let envelope = Envelope {
            data: STANDARD.encode(b"payload"),
            timestamp: 0,
            checksum: "bogus".to_string(),
            size: 7,
        };
        let encoded = STANDARD.encode(serde_json::to_vec(&envelope).unwrap());
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.bytes, b"payload");
        assert!(!decoded.checksum_ok);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("%%%"), Err(CodecError::Base64(_))));
        let not_json = STANDARD.encode(b"plain text");
        assert!(matches!(decode(&not_json), Err(CodecError::Envelope(_))));
    }

    #[test]
    fn test_digest_is_stable_hex() {
        let d = digest("abc");
        assert_eq!(d.len(), 64);
        assert_eq!(d, digest("abc"));
        assert_ne!(d, digest("abd"));
    }

    proptest! {
        #[test]
        fn prop_encoded_form_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let blob = encode(&bytes).unwrap();
            let decoded = decode(&blob.encoded).unwrap();
            prop_assert_eq!(&decoded.bytes, &bytes);
            prop_assert!(decoded.checksum_ok);
            prop_assert_eq!(checksum(&decoded.bytes), blob.checksum);
        }
    }
}
