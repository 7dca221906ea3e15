//! Error types for the MEMGOV storage layer.

use thiserror::Error;
use uuid::Uuid;

use memgov_domain::{GovernanceError, MemoryId};

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend connection error
    #[error("storage connection failed: {0}")]
    Connection(String),

    /// Backend query error
    #[error("storage query failed: {0}")]
    Query(String),

    /// Memory item not found (or already hard-deleted)
    #[error("memory not found: {memory_id}")]
    NotFound { memory_id: MemoryId },

    /// The ledger refused or failed an append. The governed operation that
    /// produced the record must be reported as failed.
    #[error("audit append rejected: {0}")]
    AppendRejected(String),

    /// Signature verification failed on a stored audit record
    #[error("audit integrity failure on record {audit_id}")]
    IntegrityFailure { audit_id: Uuid },

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for GovernanceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { memory_id } => GovernanceError::MemoryNotFound(memory_id),
            StorageError::IntegrityFailure { audit_id } => {
                GovernanceError::AuditIntegrity { audit_id }
            }
            other => GovernanceError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
