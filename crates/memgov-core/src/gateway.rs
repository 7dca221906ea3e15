//! Framework adapter boundary — the thin facade external agent frameworks
//! talk to.
//!
//! Translation only: every method delegates to the kill switch, policy
//! engine, context builder, or storage adapter. No governance logic of its
//! own, so there is nothing here for a caller to bypass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::Instrument;

use memgov_domain::{
    AgentState, AgentStatus, AuditDecision, AuditOperation, AuditRecord, GovernanceError, Memory,
    MemoryDraft, MemoryId, Operation, PolicyConfig, PolicyEngine, Result, POLICY_VERSION,
};
use memgov_state::{
    AuditFilters, AuditLedger, HealthStatus, HmacRecordSigner, InMemoryAgentStateStore,
    InMemoryAuditLedger, InMemoryStorageAdapter, StorageAdapter, WriteContext,
};

use crate::context::{ContextBuilder, ContextRequest, GovernedContext};
use crate::kill_switch::KillSwitch;
use crate::obs;

/// Ordered audit records plus the span they cover, for compliance export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditExport {
    pub records: Vec<AuditRecord>,
    pub count: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Single entry point for any transport layer (HTTP handlers, RPC, direct
/// library calls).
#[derive(Clone)]
pub struct MemoryGateway {
    engine: PolicyEngine,
    storage: Arc<dyn StorageAdapter>,
    ledger: Arc<dyn AuditLedger>,
    kill_switch: KillSwitch,
    builder: ContextBuilder,
}

impl MemoryGateway {
    pub fn new(
        engine: PolicyEngine,
        storage: Arc<dyn StorageAdapter>,
        ledger: Arc<dyn AuditLedger>,
        kill_switch: KillSwitch,
    ) -> Self {
        let builder = ContextBuilder::new(storage.clone(), kill_switch.clone(), ledger.clone());
        MemoryGateway {
            engine,
            storage,
            ledger,
            kill_switch,
            builder,
        }
    }

    /// Fully in-memory gateway: default policy, HMAC signer over the given
    /// key, in-memory stores. The standard wiring for development and
    /// tests.
    pub fn in_memory(signing_key: &[u8]) -> Self {
        let signer = Arc::new(HmacRecordSigner::new(signing_key.to_vec()));
        let ledger: Arc<dyn AuditLedger> = Arc::new(InMemoryAuditLedger::new(signer));
        let engine = PolicyEngine::new(PolicyConfig::default());
        let storage: Arc<dyn StorageAdapter> = Arc::new(InMemoryStorageAdapter::new(
            ledger.clone(),
            engine.clone(),
        ));
        let kill_switch = KillSwitch::new(Arc::new(InMemoryAgentStateStore::new()), ledger.clone());
        Self::new(engine, storage, ledger, kill_switch)
    }

    /// Governed read path: build policy-filtered context for an agent.
    pub async fn build_context(&self, request: &ContextRequest) -> Result<GovernedContext> {
        self.builder.build(request).await
    }

    /// Governed write path.
    ///
    /// Kill switch first, then policy evaluation, then the atomic
    /// write-plus-audit inside the storage adapter. Denials are audited
    /// before they surface.
    ///
    /// # Errors
    ///
    /// `AgentDisabled` when the agent is stopped (permanent until an
    /// explicit enable); `PolicyEnforcement` when frozen or denied by
    /// policy (temporary / per-item); `InvalidPolicy` for malformed
    /// drafts.
    pub async fn record_memory(
        &self,
        agent_id: &str,
        request_id: &str,
        draft: MemoryDraft,
    ) -> Result<AuditRecord> {
        let span = obs::request_span(agent_id, request_id);
        self.record_memory_inner(agent_id, request_id, draft)
            .instrument(span)
            .await
    }

    async fn record_memory_inner(
        &self,
        agent_id: &str,
        request_id: &str,
        draft: MemoryDraft,
    ) -> Result<AuditRecord> {
        if agent_id.trim().is_empty() {
            return Err(GovernanceError::InvalidPolicy(
                "agent_id must not be empty".into(),
            ));
        }

        if let Err(err) = self.kill_switch.check_allowed(agent_id, Operation::Write).await {
            self.audit_denied_write(agent_id, request_id, &err).await?;
            return Err(err);
        }

        let decision = match self.engine.evaluate_write(&draft, agent_id) {
            Ok(decision) => decision,
            Err(err) => {
                self.audit_denied_write(agent_id, request_id, &err).await?;
                return Err(err);
            }
        };

        let memory = Memory::from_draft(
            draft,
            decision.effective_ttl_seconds,
            Utc::now(),
            request_id,
        );
        let memory_id = memory.memory_id;
        let ttl = decision.effective_ttl_seconds;

        let record = self
            .storage
            .write(
                memory,
                WriteContext {
                    request_id: request_id.to_string(),
                    policy_version: POLICY_VERSION.to_string(),
                    reason: decision.reason,
                },
            )
            .await?;

        obs::emit_memory_recorded(agent_id, &memory_id.to_string(), ttl);
        Ok(record)
    }

    /// Whether the agent is fully enabled (neither disabled nor frozen).
    pub async fn check_agent_enabled(&self, agent_id: &str) -> Result<bool> {
        let status = self.kill_switch.status(agent_id).await?;
        Ok(status.state == AgentState::Enabled)
    }

    /// Current kill-switch status for an agent.
    pub async fn get_agent_status(&self, agent_id: &str) -> Result<AgentStatus> {
        self.kill_switch.status(agent_id).await
    }

    /// Hard-delete one memory (compliance purge, TTL sweep).
    pub async fn delete_memory(
        &self,
        memory_id: MemoryId,
        actor_id: &str,
        reason: &str,
    ) -> Result<AuditRecord> {
        Ok(self.storage.delete(memory_id, actor_id, reason).await?)
    }

    /// Ordered audit records for a filter, with count and covered span.
    pub async fn export_audit_log(&self, filters: &AuditFilters) -> Result<AuditExport> {
        let records = self.ledger.query(filters).await?;
        let start = records.first().map(|r| r.timestamp);
        let end = records.last().map(|r| r.timestamp);
        Ok(AuditExport {
            count: records.len(),
            start,
            end,
            records,
        })
    }

    /// Storage backend liveness.
    pub async fn health_check(&self) -> Result<HealthStatus> {
        Ok(self.storage.health_check().await?)
    }

    /// Admin surface: the kill switch itself.
    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    /// The active policy engine (read-only; decisions are never cached).
    pub fn policy_engine(&self) -> &PolicyEngine {
        &self.engine
    }

    async fn audit_denied_write(
        &self,
        agent_id: &str,
        request_id: &str,
        err: &GovernanceError,
    ) -> Result<()> {
        let reason = match err.deny_reason() {
            Some(reason) => reason.to_string(),
            None => err.to_string(),
        };
        obs::emit_write_denied(agent_id, &reason);
        let record = AuditRecord::new(
            agent_id,
            request_id,
            AuditOperation::Write,
            None,
            POLICY_VERSION,
            AuditDecision::Denied,
            reason,
            agent_id,
            json!({}),
        );
        self.ledger.append(record).await?;
        Ok(())
    }
}
