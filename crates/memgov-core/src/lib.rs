//! MEMGOV Core Library
//!
//! Orchestrates the governance enforcement pipeline: kill switch → policy
//! evaluation → storage → audit. Re-exports the domain and storage layers
//! so hosts can depend on this crate alone.
//!
//! The pipeline is request-scoped and stateless between calls; the only
//! shared state is the durable stores behind the storage traits. Nothing
//! here caches a policy decision or an agent state — every check re-reads
//! and re-evaluates, which is what makes the kill switch instant and the
//! TTL boundary exact.

pub mod context;
pub mod gateway;
pub mod kill_switch;
pub mod obs;
pub mod telemetry;

pub use context::{ContextBuilder, ContextMetadata, ContextRequest, GovernedContext};
pub use gateway::{AuditExport, MemoryGateway};
pub use kill_switch::KillSwitch;
pub use telemetry::init_tracing;

pub use memgov_domain::{
    AgentState, AgentStatus, AuditDecision, AuditOperation, AuditRecord, DenyReason,
    GovernanceError, Memory, MemoryDraft, MemoryId, MemoryPolicy, MemoryType, Operation,
    PolicyCheck, PolicyConfig, PolicyConstraints, PolicyEngine, Result, Scope, Sensitivity,
    Signature, TtlTable, WriteDecision, POLICY_VERSION,
};

pub use memgov_state::{
    AgentStateStore, AuditFilters, AuditLedger, HealthStatus, HmacRecordSigner,
    InMemoryAgentStateStore, InMemoryAuditLedger, InMemoryStorageAdapter, MemoryFilters,
    RecordSigner, StorageAdapter, StorageError, WriteContext,
};

/// MEMGOV version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
