//! Governance error taxonomy.
//!
//! Denials are expected control flow: they surface as typed variants the
//! caller must handle, and every one of them is paired with a durable audit
//! record by the layer that raised it. Nothing here is a panic path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::MemoryId;

/// Why a governance check denied an operation.
///
/// Rendered in snake_case so the same code appears in the error, the audit
/// record's `reason` field, and any exported compliance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Expired,
    ScopeNotAllowed,
    ReadNotAllowed,
    WriteNotAllowed,
    FrozenWriteDenied,
    AgentOwnershipViolation,
    IsolationViolation,
    MemoryNotFound,
}

impl DenyReason {
    /// Expiry is tracked separately from authorization failures in
    /// retrieval-guard filter counts.
    pub fn is_expiry(&self) -> bool {
        matches!(self, DenyReason::Expired)
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::Expired => write!(f, "expired"),
            DenyReason::ScopeNotAllowed => write!(f, "scope_not_allowed"),
            DenyReason::ReadNotAllowed => write!(f, "read_not_allowed"),
            DenyReason::WriteNotAllowed => write!(f, "write_not_allowed"),
            DenyReason::FrozenWriteDenied => write!(f, "frozen_write_denied"),
            DenyReason::AgentOwnershipViolation => write!(f, "agent_ownership_violation"),
            DenyReason::IsolationViolation => write!(f, "isolation_violation"),
            DenyReason::MemoryNotFound => write!(f, "memory_not_found"),
        }
    }
}

/// MEMGOV governance errors.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Malformed or out-of-range policy attributes at write time. Local,
    /// synchronous, never retried automatically.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Denied by an active, well-formed policy (expired TTL, scope
    /// violation, frozen write). A denial, not a bug.
    #[error("policy enforcement denied operation: {reason}")]
    PolicyEnforcement { reason: DenyReason },

    /// The agent is stopped by the kill switch — distinct from a per-item
    /// policy denial so callers can tell "permanently stopped" from
    /// "temporarily blocked".
    #[error("agent disabled: {agent_id}")]
    AgentDisabled { agent_id: String },

    #[error("memory not found: {0}")]
    MemoryNotFound(MemoryId),

    /// Cross-scope access attempt. Always audited at decision=denied.
    #[error("isolation violation: agent {agent_id} attempted access to memory {memory_id}")]
    IsolationViolation {
        agent_id: String,
        memory_id: MemoryId,
    },

    /// Signature verification failed on a stored record. Fatal for that
    /// record's trustworthiness; never silently ignored.
    #[error("audit integrity failure on record {audit_id}")]
    AuditIntegrity { audit_id: Uuid },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GovernanceError {
    /// The snake_case reason code carried into the audit record for this
    /// error, when one applies.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            GovernanceError::PolicyEnforcement { reason } => Some(*reason),
            GovernanceError::IsolationViolation { .. } => Some(DenyReason::IsolationViolation),
            _ => None,
        }
    }
}

/// Result type for MEMGOV domain operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;
