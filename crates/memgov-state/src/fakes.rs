//! In-memory fakes for the storage traits (development and testing)
//!
//! Provides `InMemoryAuditLedger`, `InMemoryAgentStateStore`, and
//! `InMemoryStorageAdapter` that satisfy the full trait contracts without
//! external dependencies, plus a `FailingAuditLedger` for exercising
//! fail-closed paths. The adapter implements the complete retrieval guard:
//! policy-aware reads, TTL exclusion, isolation, and audit coupling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use memgov_domain::{
    AgentStatus, AuditDecision, AuditOperation, AuditRecord, DenyReason, Memory, MemoryId,
    PolicyCheck, PolicyEngine, Signature, POLICY_VERSION,
};

use crate::error::{StorageError, StorageResult};
use crate::signer::RecordSigner;
use crate::storage_traits::{
    AgentStateStore, AuditFilters, AuditLedger, HealthStatus, MemoryFilters, StorageAdapter,
    WriteContext,
};

// ---------------------------------------------------------------------------
// InMemoryAuditLedger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerInner {
    /// (insertion sequence, record) pairs in append order.
    records: Vec<(u64, AuditRecord)>,
    next_seq: u64,
}

/// In-memory append-only ledger backed by a `Vec` plus a monotonic
/// insertion sequence. The sequence is assigned under the same lock as the
/// push, so it is globally monotonic and never reused.
pub struct InMemoryAuditLedger {
    signer: Arc<dyn RecordSigner>,
    inner: Mutex<LedgerInner>,
}

impl InMemoryAuditLedger {
    pub fn new(signer: Arc<dyn RecordSigner>) -> Self {
        InMemoryAuditLedger {
            signer,
            inner: Mutex::new(LedgerInner::default()),
        }
    }
}

#[async_trait]
impl AuditLedger for InMemoryAuditLedger {
    async fn append(&self, mut record: AuditRecord) -> StorageResult<Signature> {
        record.signature = self.signer.sign(&record);
        let signature = record.signature.clone();

        let seq = {
            let mut inner = self.inner.lock().unwrap();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.records.push((seq, record));
            seq
        };
        tracing::debug!(event = "ledger.appended", seq = seq);

        Ok(signature)
    }

    async fn query(&self, filters: &AuditFilters) -> StorageResult<Vec<AuditRecord>> {
        let mut matching: Vec<(u64, AuditRecord)> = {
            let inner = self.inner.lock().unwrap();
            inner
                .records
                .iter()
                .filter(|(_, r)| filters.matches(r))
                .cloned()
                .collect()
        };

        // Non-decreasing timestamp, ties broken by insertion sequence.
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            a.timestamp.cmp(&b.timestamp).then(seq_a.cmp(seq_b))
        });

        // Fail closed: a single bad signature poisons the whole response.
        for (_, record) in &matching {
            self.signer.verify(record)?;
        }

        let mut records: Vec<AuditRecord> = matching.into_iter().map(|(_, r)| r).collect();
        if let Some(limit) = filters.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn verify(&self, record: &AuditRecord) -> StorageResult<()> {
        self.signer.verify(record)
    }
}

// ---------------------------------------------------------------------------
// FailingAuditLedger
// ---------------------------------------------------------------------------

/// A ledger whose appends always fail. Lets tests assert that governed
/// operations report failure when their audit record cannot be written.
#[derive(Debug, Default)]
pub struct FailingAuditLedger;

#[async_trait]
impl AuditLedger for FailingAuditLedger {
    async fn append(&self, _record: AuditRecord) -> StorageResult<Signature> {
        Err(StorageError::AppendRejected(
            "ledger backend unavailable".into(),
        ))
    }

    async fn query(&self, _filters: &AuditFilters) -> StorageResult<Vec<AuditRecord>> {
        Ok(Vec::new())
    }

    async fn verify(&self, record: &AuditRecord) -> StorageResult<()> {
        Err(StorageError::IntegrityFailure {
            audit_id: record.audit_id,
        })
    }
}

// ---------------------------------------------------------------------------
// InMemoryAgentStateStore
// ---------------------------------------------------------------------------

/// In-memory agent state backed by a `HashMap<agent_id, AgentStatus>`.
///
/// Every `get` goes through the shared map, so a `set` from one handler is
/// visible to the next check from any other handler — no staleness window.
#[derive(Default)]
pub struct InMemoryAgentStateStore {
    states: Mutex<HashMap<String, AgentStatus>>,
}

impl InMemoryAgentStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStateStore for InMemoryAgentStateStore {
    async fn get(&self, agent_id: &str) -> StorageResult<AgentStatus> {
        let mut states = self.states.lock().unwrap();
        let status = states
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentStatus::enabled(agent_id));
        Ok(status.clone())
    }

    async fn set(&self, status: AgentStatus) -> StorageResult<()> {
        let mut states = self.states.lock().unwrap();
        states.insert(status.agent_id.clone(), status);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<AgentStatus>> {
        let states = self.states.lock().unwrap();
        let mut all: Vec<AgentStatus> = states.values().cloned().collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// InMemoryStorageAdapter
// ---------------------------------------------------------------------------

/// In-memory governed memory store.
///
/// Implements the full governance contract: policy-aware reads, TTL
/// enforcement, agent/tenant isolation, deterministic ordering, and audit
/// coupling through the shared ledger. Suitable for development and tests;
/// production backends implement the same trait against real storage.
pub struct InMemoryStorageAdapter {
    memories: Mutex<HashMap<MemoryId, Memory>>,
    ledger: Arc<dyn AuditLedger>,
    engine: PolicyEngine,
}

impl InMemoryStorageAdapter {
    pub fn new(ledger: Arc<dyn AuditLedger>, engine: PolicyEngine) -> Self {
        InMemoryStorageAdapter {
            memories: Mutex::new(HashMap::new()),
            ledger,
            engine,
        }
    }

    /// Append a denied audit record and hand it back.
    async fn deny(
        &self,
        agent_id: &str,
        operation: AuditOperation,
        memory_id: Option<MemoryId>,
        reason: String,
    ) -> StorageResult<AuditRecord> {
        let mut record = AuditRecord::new(
            agent_id,
            "",
            operation,
            memory_id,
            POLICY_VERSION,
            AuditDecision::Denied,
            reason,
            agent_id,
            json!({}),
        );
        record.signature = self.ledger.append(record.clone()).await?;
        Ok(record)
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorageAdapter {
    async fn write(&self, memory: Memory, ctx: WriteContext) -> StorageResult<AuditRecord> {
        // Boundary re-validation. The policy engine has already approved
        // the draft; the adapter still refuses obviously unsound rows.
        if memory.agent_id.trim().is_empty() {
            return Err(StorageError::Query("memory must carry an agent_id".into()));
        }
        if memory.policy.ttl_seconds <= 0 {
            return Err(StorageError::Query(format!(
                "memory must carry a positive TTL, got {}",
                memory.policy.ttl_seconds
            )));
        }

        let mut record = AuditRecord::new(
            &memory.agent_id,
            &ctx.request_id,
            AuditOperation::Write,
            Some(memory.memory_id),
            &ctx.policy_version,
            AuditDecision::Allowed,
            &ctx.reason,
            &memory.agent_id,
            json!({
                "memory_type": memory.policy.memory_type,
                "sensitivity": memory.policy.sensitivity,
                "scope": memory.policy.scope,
                "ttl_seconds": memory.policy.ttl_seconds,
            }),
        );

        // Audit first: if the append fails the write is reported failed
        // and no memory is observable.
        record.signature = self.ledger.append(record.clone()).await?;

        let mut memories = self.memories.lock().unwrap();
        memories.insert(memory.memory_id, memory);

        Ok(record)
    }

    async fn read(
        &self,
        memory_id: MemoryId,
        agent_id: &str,
        check: &PolicyCheck,
    ) -> StorageResult<(Option<Memory>, AuditRecord)> {
        let now = Utc::now();
        let memory = {
            let memories = self.memories.lock().unwrap();
            memories.get(&memory_id).cloned()
        };

        let Some(memory) = memory else {
            let record = self
                .deny(
                    agent_id,
                    AuditOperation::Read,
                    Some(memory_id),
                    DenyReason::MemoryNotFound.to_string(),
                )
                .await?;
            return Ok((None, record));
        };

        if let Some(reason) = self.engine.read_denial(&memory, check, now) {
            let record = self
                .deny(
                    agent_id,
                    AuditOperation::Read,
                    Some(memory_id),
                    reason.to_string(),
                )
                .await?;
            return Ok((None, record));
        }

        let mut record = AuditRecord::new(
            agent_id,
            "",
            AuditOperation::Read,
            Some(memory_id),
            POLICY_VERSION,
            AuditDecision::Allowed,
            "policy_checks_passed",
            agent_id,
            json!({
                "scope": memory.policy.scope,
                "sensitivity": memory.policy.sensitivity,
            }),
        );
        record.signature = self.ledger.append(record.clone()).await?;

        Ok((Some(memory), record))
    }

    async fn query(
        &self,
        filters: &MemoryFilters,
        agent_id: &str,
        check: &PolicyCheck,
    ) -> StorageResult<(Vec<Memory>, AuditRecord)> {
        let now = Utc::now();
        let mut results: Vec<Memory> = Vec::new();
        let mut filtered_by_request = 0u64;
        let mut filtered_expired = 0u64;
        let mut filtered_unauthorized = 0u64;
        let total_examined;

        {
            let memories = self.memories.lock().unwrap();
            total_examined = memories.len() as u64;

            for memory in memories.values() {
                if !filters.matches(memory) {
                    filtered_by_request += 1;
                    continue;
                }
                match self.engine.read_denial(memory, check, now) {
                    Some(reason) if reason.is_expiry() => filtered_expired += 1,
                    Some(_) => filtered_unauthorized += 1,
                    None => results.push(memory.clone()),
                }
            }
        }

        // Most-recent-first, ties broken by id: a stable order the context
        // builder's budget cutoff can rely on.
        results.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.memory_id.to_string().cmp(&b.memory_id.to_string()))
        });

        let mut record = AuditRecord::new(
            agent_id,
            "",
            AuditOperation::Query,
            None,
            POLICY_VERSION,
            AuditDecision::Filtered,
            "retrieval_guard_applied",
            agent_id,
            json!({
                "total_examined": total_examined,
                "filtered_by_request": filtered_by_request,
                "filtered_expired": filtered_expired,
                "filtered_unauthorized": filtered_unauthorized,
                "returned_count": results.len() as u64,
            }),
        );
        record.signature = self.ledger.append(record.clone()).await?;

        Ok((results, record))
    }

    async fn delete(
        &self,
        memory_id: MemoryId,
        actor_id: &str,
        reason: &str,
    ) -> StorageResult<AuditRecord> {
        let memory = {
            let memories = self.memories.lock().unwrap();
            memories
                .get(&memory_id)
                .cloned()
                .ok_or(StorageError::NotFound { memory_id })?
        };

        let mut record = AuditRecord::new(
            &memory.agent_id,
            "",
            AuditOperation::Delete,
            Some(memory_id),
            POLICY_VERSION,
            AuditDecision::Allowed,
            reason,
            actor_id,
            json!({ "deletion_reason": reason }),
        );

        // Audit before removal: if the append fails, nothing was deleted.
        record.signature = self.ledger.append(record.clone()).await?;

        {
            let mut memories = self.memories.lock().unwrap();
            memories.remove(&memory_id);
        }
        tracing::debug!(event = "memory.hard_deleted", memory_id = %memory_id, actor_id = %actor_id);

        Ok(record)
    }

    async fn get_audit_log(&self, filters: &AuditFilters) -> StorageResult<Vec<AuditRecord>> {
        self.ledger.query(filters).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }
}
