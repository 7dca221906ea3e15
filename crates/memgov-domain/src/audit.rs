//! Immutable audit records for every governance decision.
//!
//! A record is write-once: it is constructed, signed over its canonical
//! serialization, appended to the ledger, and never touched again. The
//! canonical form lives here so any holder of the key can verify a record
//! without going through the ledger.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::memory::MemoryId;

/// The governed operation an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    Write,
    Read,
    Query,
    Delete,
    Disable,
    Freeze,
    Enable,
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOperation::Write => write!(f, "write"),
            AuditOperation::Read => write!(f, "read"),
            AuditOperation::Query => write!(f, "query"),
            AuditOperation::Delete => write!(f, "delete"),
            AuditOperation::Disable => write!(f, "disable"),
            AuditOperation::Freeze => write!(f, "freeze"),
            AuditOperation::Enable => write!(f, "enable"),
        }
    }
}

/// Outcome of the governance decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Allowed,
    Denied,
    Filtered,
}

impl std::fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditDecision::Allowed => write!(f, "allowed"),
            AuditDecision::Denied => write!(f, "denied"),
            AuditDecision::Filtered => write!(f, "filtered"),
        }
    }
}

/// Keyed-hash signature over a record's canonical serialization (hex).
///
/// Empty until the ledger's signer has run. Comparison for verification
/// happens in the signer, in constant time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub String);

impl Signature {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable audit log entry.
///
/// Source of truth for compliance, replay, and incident analysis. Appended
/// by every governance decision point; never mutated or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub request_id: String,
    pub operation: AuditOperation,
    /// Absent for query-style operations that touch many items.
    pub memory_id: Option<MemoryId>,
    pub policy_version: String,
    pub decision: AuditDecision,
    pub reason: String,
    /// Who triggered the operation (agent_id or admin actor).
    pub actor_id: String,
    pub metadata: serde_json::Value,
    pub signature: Signature,
}

impl AuditRecord {
    /// Create an unsigned record stamped with a fresh id and the current time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: impl Into<String>,
        request_id: impl Into<String>,
        operation: AuditOperation,
        memory_id: Option<MemoryId>,
        policy_version: impl Into<String>,
        decision: AuditDecision,
        reason: impl Into<String>,
        actor_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        AuditRecord {
            audit_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            request_id: request_id.into(),
            operation,
            memory_id,
            policy_version: policy_version.into(),
            decision,
            reason: reason.into(),
            actor_id: actor_id.into(),
            metadata,
            signature: Signature::default(),
        }
    }

    /// Canonical serialization of every field except the signature.
    ///
    /// Keys are sorted (serde_json maps are BTree-backed) and the timestamp
    /// is rendered as RFC 3339 with fixed precision, so the same record
    /// always produces the same bytes on any host.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let canonical = json!({
            "audit_id": self.audit_id.to_string(),
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            "agent_id": self.agent_id,
            "request_id": self.request_id,
            "operation": self.operation.to_string(),
            "memory_id": self.memory_id.map(|m| m.to_string()),
            "policy_version": self.policy_version,
            "decision": self.decision.to_string(),
            "reason": self.reason,
            "actor_id": self.actor_id,
            "metadata": self.metadata,
        });
        serde_json::to_vec(&canonical).unwrap_or_default()
    }
}
