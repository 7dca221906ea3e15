//! Pluggable keyed-hash signing for audit records.
//!
//! The ledger signs every record over its canonical serialization and
//! verifies on the way out. The signer trait keeps key provisioning an
//! external concern: production wires a key from a secret store, tests use
//! a fixed key. Verification compares in constant time and fails closed —
//! a mismatch is an integrity error, never a silently dropped record.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use memgov_domain::{AuditRecord, Signature};

use crate::error::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Computes and verifies signatures over audit records.
pub trait RecordSigner: Send + Sync {
    /// Sign the record's canonical serialization (signature field excluded).
    fn sign(&self, record: &AuditRecord) -> Signature;

    /// Recompute and compare against the record's stored signature.
    ///
    /// Returns `StorageError::IntegrityFailure` on any mismatch, including
    /// an empty or malformed stored signature.
    fn verify(&self, record: &AuditRecord) -> StorageResult<()>;
}

/// HMAC-SHA256 signer with hex-encoded output.
pub struct HmacRecordSigner {
    key: Vec<u8>,
}

impl HmacRecordSigner {
    /// Build a signer from raw key material.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        HmacRecordSigner { key: key.into() }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.key).expect("HMAC key of any length is valid")
    }
}

impl RecordSigner for HmacRecordSigner {
    fn sign(&self, record: &AuditRecord) -> Signature {
        let mut mac = self.mac();
        mac.update(&record.canonical_bytes());
        Signature(hex::encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, record: &AuditRecord) -> StorageResult<()> {
        let expected = self.sign(record);
        let matches: bool = expected
            .as_str()
            .as_bytes()
            .ct_eq(record.signature.as_str().as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(StorageError::IntegrityFailure {
                audit_id: record.audit_id,
            })
        }
    }
}
