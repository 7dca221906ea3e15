//! Storage trait definitions for MEMGOV
//!
//! These traits define the core storage abstractions:
//! - `StorageAdapter`: governed memory persistence (write/read/query/delete)
//! - `AuditLedger`: append-only, signed audit record store
//! - `AgentStateStore`: authoritative kill-switch state per agent
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! via the `fakes` module; any conforming backend (relational table,
//! document store) is pluggable without touching the guard, policy, or
//! kill-switch logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memgov_domain::{
    AgentStatus, AuditOperation, AuditRecord, Memory, MemoryId, MemoryType, PolicyCheck, Scope,
    Sensitivity, Signature,
};

use crate::error::StorageResult;

// ---------------------------------------------------------------------------
// Filters & request context
// ---------------------------------------------------------------------------

/// Query filters for memory retrieval. All fields optional; an empty filter
/// examines everything the policy check permits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFilters {
    /// Restrict to these retention classes.
    pub memory_types: Option<Vec<MemoryType>>,
    /// Restrict to these sensitivity levels.
    pub sensitivities: Option<Vec<Sensitivity>>,
    /// Restrict to a single scope.
    pub scope: Option<Scope>,
}

impl MemoryFilters {
    /// Whether a memory's attributes pass the requested filters.
    ///
    /// Filter matching only — policy enforcement (TTL, isolation,
    /// permissions) is a separate, mandatory step.
    pub fn matches(&self, memory: &Memory) -> bool {
        if let Some(types) = &self.memory_types {
            if !types.contains(&memory.policy.memory_type) {
                return false;
            }
        }
        if let Some(sensitivities) = &self.sensitivities {
            if !sensitivities.contains(&memory.policy.sensitivity) {
                return false;
            }
        }
        if let Some(scope) = self.scope {
            if memory.policy.scope != scope {
                return false;
            }
        }
        true
    }
}

/// Filters for audit log queries (compliance export surface).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilters {
    pub agent_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub operation: Option<AuditOperation>,
    /// Cap on returned records; `None` returns everything in range.
    pub limit: Option<usize>,
}

impl AuditFilters {
    /// Filter to a single agent's stream.
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        AuditFilters {
            agent_id: Some(agent_id.into()),
            ..Default::default()
        }
    }

    /// Whether a record passes the agent/time/operation filters.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(agent_id) = &self.agent_id {
            if &record.agent_id != agent_id {
                return false;
            }
        }
        if let Some(start) = self.start {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if record.timestamp > end {
                return false;
            }
        }
        if let Some(operation) = self.operation {
            if record.operation != operation {
                return false;
            }
        }
        true
    }
}

/// Per-request context attached to a governed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteContext {
    pub request_id: String,
    pub policy_version: String,
    /// Audit-reason form of the approving decision.
    pub reason: String,
}

/// Operational liveness signal from a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded { detail: String },
}

// ---------------------------------------------------------------------------
// AuditLedger — append-only, signed record store
// ---------------------------------------------------------------------------

/// Append-only, signed audit record store.
///
/// Guarantees:
/// - `append` is the only mutation; no update or delete exists.
/// - Records are returned in non-decreasing timestamp order, ties broken by
///   a globally monotonic insertion sequence assigned at append time and
///   never reused.
/// - Every record is signed at append over its canonical serialization;
///   `query` re-verifies before returning and fails closed on mismatch.
/// - If an append fails, the governance decision that produced the record
///   must be reported as failed by the caller — never "succeeded silently
///   without audit".
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Sign and durably append a record, returning its signature.
    async fn append(&self, record: AuditRecord) -> StorageResult<Signature>;

    /// Return matching records in ledger order, signatures verified.
    async fn query(&self, filters: &AuditFilters) -> StorageResult<Vec<AuditRecord>>;

    /// Verify a record's signature against the ledger's key.
    async fn verify(&self, record: &AuditRecord) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// AgentStateStore — authoritative kill-switch state
// ---------------------------------------------------------------------------

/// Authoritative per-agent execution state.
///
/// Guarantees:
/// - `get` reflects the latest `set` from any caller — implementations must
///   not serve a cached or in-process copy; disabling an agent takes effect
///   on the very next check from any handler.
/// - An agent is created enabled on first observation.
/// - `set` is atomic per record.
#[async_trait]
pub trait AgentStateStore: Send + Sync {
    /// Current status, creating the enabled record on first observation.
    async fn get(&self, agent_id: &str) -> StorageResult<AgentStatus>;

    /// Replace an agent's status.
    async fn set(&self, status: AgentStatus) -> StorageResult<()>;

    /// All agents ever observed by this store.
    async fn list(&self) -> StorageResult<Vec<AgentStatus>>;
}

// ---------------------------------------------------------------------------
// StorageAdapter — governed memory persistence
// ---------------------------------------------------------------------------

/// Governed memory persistence contract.
///
/// Guarantees every backend must provide:
/// - Policy-aware reads: read evaluation happens inside the adapter, before
///   data leaves the boundary; unauthorized rows are never returned for the
///   caller to filter.
/// - TTL enforcement: expired memory is excluded at retrieval time.
/// - Audit coupling: memory write and audit append succeed or fail as one
///   logical transaction; a denial still produces a denied audit record.
/// - Hard delete only: no tombstones, and deleting an absent id fails with
///   `NotFound` so compliance callers can tell a no-op from a purge.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Persist an approved memory and its audit record atomically.
    async fn write(&self, memory: Memory, ctx: WriteContext) -> StorageResult<AuditRecord>;

    /// Read one memory, applying read evaluation at retrieval time.
    ///
    /// A denial (absent, expired, unauthorized) returns `(None, record)`
    /// with `decision = denied` and the reason in the record.
    async fn read(
        &self,
        memory_id: MemoryId,
        agent_id: &str,
        check: &PolicyCheck,
    ) -> StorageResult<(Option<Memory>, AuditRecord)>;

    /// Query memories with retrieval-guard filtering applied inside the
    /// boundary. Results are most-recent-first (created_at descending,
    /// ties by memory id) for deterministic downstream budgeting.
    async fn query(
        &self,
        filters: &MemoryFilters,
        agent_id: &str,
        check: &PolicyCheck,
    ) -> StorageResult<(Vec<Memory>, AuditRecord)>;

    /// Hard-delete a memory. Fails with `NotFound` if absent or already
    /// deleted.
    async fn delete(
        &self,
        memory_id: MemoryId,
        actor_id: &str,
        reason: &str,
    ) -> StorageResult<AuditRecord>;

    /// Read-only passthrough to the audit ledger.
    async fn get_audit_log(&self, filters: &AuditFilters) -> StorageResult<Vec<AuditRecord>>;

    /// Operational liveness signal.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
