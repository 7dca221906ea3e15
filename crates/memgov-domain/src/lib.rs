//! MEMGOV Domain Model
//!
//! Defines the governed-memory domain as plain data plus pure functions:
//! - `Memory` / `MemoryPolicy`: a memory item and its governance contract
//! - `AuditRecord`: immutable, signable record of every governance decision
//! - `AgentState`: tagged enabled/disabled/frozen state for the kill switch
//! - `PolicyEngine`: declarative policy table and write/read evaluation
//!
//! This crate is intentionally I/O-free. Everything here is deterministic:
//! the same inputs (memory, policy check, clock) always produce the same
//! decision, which is what makes the enforcement pipeline replayable.

pub mod agent_state;
pub mod audit;
pub mod error;
pub mod memory;
pub mod policy;

pub use agent_state::{AgentState, AgentStatus, Operation};
pub use audit::{AuditDecision, AuditOperation, AuditRecord, Signature};
pub use error::{DenyReason, GovernanceError, Result};
pub use memory::{Memory, MemoryDraft, MemoryId, MemoryPolicy, MemoryType, Scope, Sensitivity};
pub use policy::{
    PolicyCheck, PolicyConfig, PolicyConstraints, PolicyEngine, TtlTable, WriteDecision,
    POLICY_VERSION,
};

/// MEMGOV domain version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
