//! Declarative policy engine: retention table, constraints, and the pure
//! write/read evaluation functions.
//!
//! The retention rules are data, not code — `PolicyConfig` is a serde
//! structure, so a policy change is an auditable config diff. Evaluation is
//! side-effect-free and keyed only on (input, clock): no caching, no prior
//! decisions, no hidden state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DenyReason, GovernanceError, Result};
use crate::memory::{Memory, MemoryDraft, Scope, Sensitivity};

/// Version stamped on every policy decision and audit record.
pub const POLICY_VERSION: &str = "1.0.0";

/// Default retention per (sensitivity, scope), in seconds.
///
/// | sensitivity | scope  | ttl_seconds |
/// |-------------|--------|-------------|
/// | pii         | agent  | 86400       |
/// | pii         | tenant | 604800      |
/// | non_pii     | agent  | 2592000     |
/// | non_pii     | tenant | 7776000     |
///
/// `fallback` is the table's safety default (one day): a custom config
/// that zeroes out a combination falls back to it rather than assigning
/// no retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlTable {
    pub pii_agent: i64,
    pub pii_tenant: i64,
    pub non_pii_agent: i64,
    pub non_pii_tenant: i64,
    pub fallback: i64,
}

impl TtlTable {
    /// Pure lookup keyed by (sensitivity, scope). Total over the enums.
    pub fn lookup(&self, sensitivity: Sensitivity, scope: Scope) -> i64 {
        match (sensitivity, scope) {
            (Sensitivity::Pii, Scope::Agent) => self.pii_agent,
            (Sensitivity::Pii, Scope::Tenant) => self.pii_tenant,
            (Sensitivity::NonPii, Scope::Agent) => self.non_pii_agent,
            (Sensitivity::NonPii, Scope::Tenant) => self.non_pii_tenant,
        }
    }
}

impl Default for TtlTable {
    fn default() -> Self {
        TtlTable {
            pii_agent: 86_400,        // 1 day
            pii_tenant: 604_800,      // 7 days
            non_pii_agent: 2_592_000, // 30 days
            non_pii_tenant: 7_776_000, // 90 days
            fallback: 86_400,
        }
    }
}

/// Hard limits applied on top of the retention table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConstraints {
    /// Global ceiling for any explicit TTL, regardless of combination.
    pub max_ttl_seconds: i64,
}

impl Default for PolicyConstraints {
    fn default() -> Self {
        PolicyConstraints {
            max_ttl_seconds: 7_776_000,
        }
    }
}

/// Complete declarative policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub ttl: TtlTable,
    pub constraints: PolicyConstraints,
}

/// Runtime policy enforcement context, constructed fresh per request and
/// never cached. Passed into every read and query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheck {
    pub agent_id: String,
    pub allowed_scopes: Vec<Scope>,
    pub allow_read: bool,
    pub allow_write: bool,
}

impl PolicyCheck {
    /// The standard check for an agent: own scope plus tenant scope, read
    /// and write permitted. Kill-switch state is enforced separately.
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        PolicyCheck {
            agent_id: agent_id.into(),
            allowed_scopes: vec![Scope::Agent, Scope::Tenant],
            allow_read: true,
            allow_write: true,
        }
    }
}

/// Outcome of a successful write evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteDecision {
    /// Why the write was allowed, in audit-reason form.
    pub reason: String,
    /// The TTL the engine settled on: the draft's explicit value, or the
    /// table default for the (sensitivity, scope) combination.
    pub effective_ttl_seconds: i64,
}

/// Evaluate and enforce governance rules.
///
/// Decisions happen before any memory operation and are non-bypassable:
/// the storage boundary only accepts drafts that carry an approval.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        PolicyEngine { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Default TTL for a (sensitivity, scope) combination. A combination
    /// the config left unset (non-positive) gets the table's fallback.
    pub fn default_ttl(&self, sensitivity: Sensitivity, scope: Scope) -> i64 {
        let ttl = self.config.ttl.lookup(sensitivity, scope);
        if ttl > 0 {
            ttl
        } else {
            self.config.ttl.fallback
        }
    }

    /// Maximum permitted TTL for a combination: the table entry, capped by
    /// the global constraint.
    pub fn max_ttl(&self, sensitivity: Sensitivity, scope: Scope) -> i64 {
        self.config
            .ttl
            .lookup(sensitivity, scope)
            .min(self.config.constraints.max_ttl_seconds)
    }

    /// Evaluate whether a draft may be written by `requesting_agent`.
    ///
    /// # Errors
    ///
    /// `InvalidPolicy` for malformed attributes (empty agent id,
    /// non-positive or over-limit TTL, short-term persistence);
    /// `PolicyEnforcement` for well-formed but denied requests (ownership
    /// mismatch, write permission withheld by the draft itself).
    pub fn evaluate_write(
        &self,
        draft: &MemoryDraft,
        requesting_agent: &str,
    ) -> Result<WriteDecision> {
        if draft.agent_id.trim().is_empty() {
            return Err(GovernanceError::InvalidPolicy(
                "agent_id must not be empty".into(),
            ));
        }

        if draft.agent_id != requesting_agent {
            return Err(GovernanceError::PolicyEnforcement {
                reason: DenyReason::AgentOwnershipViolation,
            });
        }

        if !draft.memory_type.is_persistent() {
            return Err(GovernanceError::InvalidPolicy(format!(
                "memory type {} is request-scoped and never persisted",
                draft.memory_type
            )));
        }

        if !draft.allow_write {
            return Err(GovernanceError::PolicyEnforcement {
                reason: DenyReason::WriteNotAllowed,
            });
        }

        let effective_ttl = match draft.ttl_seconds {
            Some(ttl) if ttl <= 0 => {
                return Err(GovernanceError::InvalidPolicy(format!(
                    "invalid_ttl: TTL must be positive, got {ttl}"
                )));
            }
            Some(ttl) => {
                let max = self.max_ttl(draft.sensitivity, draft.scope);
                if ttl > max {
                    return Err(GovernanceError::InvalidPolicy(format!(
                        "ttl_exceeds_policy: {ttl} > {max} for {}/{}",
                        draft.sensitivity, draft.scope
                    )));
                }
                ttl
            }
            None => self.default_ttl(draft.sensitivity, draft.scope),
        };

        Ok(WriteDecision {
            reason: "all_policy_checks_passed".into(),
            effective_ttl_seconds: effective_ttl,
        })
    }

    /// Evaluate whether `check` may read `memory` at `now`.
    ///
    /// Deterministic: same (memory, check, now) always yields the same
    /// decision.
    pub fn evaluate_read(
        &self,
        memory: &Memory,
        check: &PolicyCheck,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match self.read_denial(memory, check, now) {
            None => Ok(()),
            Some(DenyReason::IsolationViolation) => Err(GovernanceError::IsolationViolation {
                agent_id: check.agent_id.clone(),
                memory_id: memory.memory_id,
            }),
            Some(reason) => Err(GovernanceError::PolicyEnforcement { reason }),
        }
    }

    /// Classify a read against policy without constructing an error.
    ///
    /// The retrieval guard uses this to count exclusions by reason; `None`
    /// means the read is permitted. Checks run in enforcement order:
    /// expiry, scope allowance, read permission, agent isolation.
    pub fn read_denial(
        &self,
        memory: &Memory,
        check: &PolicyCheck,
        now: DateTime<Utc>,
    ) -> Option<DenyReason> {
        if memory.is_expired(now) {
            return Some(DenyReason::Expired);
        }

        if !check.allowed_scopes.contains(&memory.policy.scope) {
            return Some(DenyReason::ScopeNotAllowed);
        }

        if !check.allow_read || !memory.policy.allow_read {
            return Some(DenyReason::ReadNotAllowed);
        }

        if memory.policy.scope == Scope::Agent && memory.agent_id != check.agent_id {
            return Some(DenyReason::IsolationViolation);
        }

        None
    }
}
