//! Kill switch — instant, idempotent, audited control over agent execution.
//!
//! Guarantees:
//! - Instant: every check re-reads the authoritative state store; a disable
//!   takes effect on the very next check from any request handler.
//! - Idempotent: disabling an already-disabled agent succeeds and produces
//!   a fresh audit record.
//! - Audited: the audit append happens before the state change is applied.
//!   If the append fails, the transition is reported failed and no state
//!   change is observable.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use memgov_domain::{
    AgentState, AgentStatus, AuditDecision, AuditOperation, AuditRecord, DenyReason,
    GovernanceError, Operation, Result, POLICY_VERSION,
};
use memgov_state::{AgentStateStore, AuditLedger};

use crate::obs;

/// Emergency control for agent operations.
///
/// Owns the agent state store; everything else consults it through
/// [`KillSwitch::check_allowed`].
#[derive(Clone)]
pub struct KillSwitch {
    states: Arc<dyn AgentStateStore>,
    ledger: Arc<dyn AuditLedger>,
}

impl KillSwitch {
    pub fn new(states: Arc<dyn AgentStateStore>, ledger: Arc<dyn AuditLedger>) -> Self {
        KillSwitch { states, ledger }
    }

    /// Check whether `operation` is currently allowed for `agent_id`.
    ///
    /// Reads the authoritative store on every call — no in-process cache,
    /// so there is no staleness window under concurrent disables.
    ///
    /// # Errors
    ///
    /// `AgentDisabled` when the agent is disabled (blocks everything);
    /// `PolicyEnforcement { FrozenWriteDenied }` when frozen and the
    /// operation requires write access.
    pub async fn check_allowed(&self, agent_id: &str, operation: Operation) -> Result<()> {
        let status = self.states.get(agent_id).await?;
        if status.state.permits(operation) {
            return Ok(());
        }
        match status.state {
            AgentState::Disabled => Err(GovernanceError::AgentDisabled {
                agent_id: agent_id.to_string(),
            }),
            AgentState::Frozen => Err(GovernanceError::PolicyEnforcement {
                reason: DenyReason::FrozenWriteDenied,
            }),
            // permits() returned false, so this arm is unreachable for
            // Enabled; kept exhaustive rather than wildcarded.
            AgentState::Enabled => Ok(()),
        }
    }

    /// Disable an agent: all operations blocked until an explicit enable.
    pub async fn disable(
        &self,
        agent_id: &str,
        reason: &str,
        actor_id: &str,
    ) -> Result<AuditRecord> {
        self.transition(
            agent_id,
            AgentState::Disabled,
            AuditOperation::Disable,
            reason,
            actor_id,
        )
        .await
    }

    /// Freeze writes but keep reads available (human-in-the-loop mode).
    pub async fn freeze_writes(
        &self,
        agent_id: &str,
        reason: &str,
        actor_id: &str,
    ) -> Result<AuditRecord> {
        self.transition(
            agent_id,
            AgentState::Frozen,
            AuditOperation::Freeze,
            reason,
            actor_id,
        )
        .await
    }

    /// Re-enable a disabled or frozen agent. An explicit transition with
    /// its own audit record, never implicit.
    pub async fn enable(&self, agent_id: &str, actor_id: &str) -> Result<AuditRecord> {
        self.transition(
            agent_id,
            AgentState::Enabled,
            AuditOperation::Enable,
            "agent_reenabled",
            actor_id,
        )
        .await
    }

    /// Emergency: disable every known agent.
    ///
    /// Returns one audit record per agent actually transitioned; agents
    /// already disabled are skipped (their state is already durable).
    pub async fn global_shutdown(&self, reason: &str, actor_id: &str) -> Result<Vec<AuditRecord>> {
        let known = self.states.list().await?;
        let mut records = Vec::new();
        for status in known {
            if status.state != AgentState::Disabled {
                records.push(self.disable(&status.agent_id, reason, actor_id).await?);
            }
        }
        obs::emit_global_shutdown(actor_id, records.len());
        Ok(records)
    }

    /// Current status of an agent, read fresh from the store.
    pub async fn status(&self, agent_id: &str) -> Result<AgentStatus> {
        Ok(self.states.get(agent_id).await?)
    }

    async fn transition(
        &self,
        agent_id: &str,
        new_state: AgentState,
        operation: AuditOperation,
        reason: &str,
        actor_id: &str,
    ) -> Result<AuditRecord> {
        let now = Utc::now();
        let mut record = AuditRecord::new(
            agent_id,
            "",
            operation,
            None,
            POLICY_VERSION,
            AuditDecision::Allowed,
            reason,
            actor_id,
            json!({ "state": new_state }),
        );

        // Durable record first. A failed append means no observable
        // state change — the caller retries the whole transition.
        record.signature = self.ledger.append(record.clone()).await?;

        self.states
            .set(AgentStatus {
                agent_id: agent_id.to_string(),
                state: new_state,
                changed_at: Some(now),
                reason: Some(reason.to_string()),
                actor_id: Some(actor_id.to_string()),
            })
            .await?;

        obs::emit_kill_switch_transition(agent_id, new_state, actor_id);
        Ok(record)
    }
}
