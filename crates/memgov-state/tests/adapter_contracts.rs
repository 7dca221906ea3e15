//! Contract tests for AuditLedger, AgentStateStore, and StorageAdapter.
//!
//! These verify the behavioral contracts of the storage traits using the
//! in-memory fakes. Any conforming backend must pass these.

use std::sync::Arc;

use chrono::{Duration, Utc};

use memgov_domain::{
    AgentState, AgentStatus, AuditDecision, AuditOperation, AuditRecord, Memory, MemoryDraft,
    MemoryId, MemoryType, PolicyCheck, PolicyEngine, Scope, Sensitivity, POLICY_VERSION,
};
use memgov_state::fakes::{
    FailingAuditLedger, InMemoryAgentStateStore, InMemoryAuditLedger, InMemoryStorageAdapter,
};
use memgov_state::{
    AgentStateStore, AuditFilters, AuditLedger, HealthStatus, HmacRecordSigner, MemoryFilters,
    RecordSigner, StorageAdapter, StorageError, WriteContext,
};
use serde_json::json;

fn signer() -> Arc<HmacRecordSigner> {
    Arc::new(HmacRecordSigner::new(b"contract-test-key".to_vec()))
}

fn ledger() -> Arc<InMemoryAuditLedger> {
    Arc::new(InMemoryAuditLedger::new(signer()))
}

fn adapter_with_ledger() -> (InMemoryStorageAdapter, Arc<InMemoryAuditLedger>) {
    let ledger = ledger();
    let adapter = InMemoryStorageAdapter::new(ledger.clone(), PolicyEngine::default());
    (adapter, ledger)
}

fn sample_record(agent_id: &str, operation: AuditOperation) -> AuditRecord {
    AuditRecord::new(
        agent_id,
        "req-1",
        operation,
        None,
        POLICY_VERSION,
        AuditDecision::Allowed,
        "contract_test",
        agent_id,
        json!({}),
    )
}

fn memory_for(agent_id: &str, scope: Scope, ttl: i64) -> Memory {
    let draft = MemoryDraft::new(
        agent_id,
        "observed deploy failure on api-7",
        MemoryType::LongTerm,
        Sensitivity::NonPii,
        scope,
    );
    Memory::from_draft(draft, ttl, Utc::now(), "req-1")
}

fn write_ctx() -> WriteContext {
    WriteContext {
        request_id: "req-1".to_string(),
        policy_version: POLICY_VERSION.to_string(),
        reason: "all_policy_checks_passed".to_string(),
    }
}

// ===========================================================================
// AuditLedger contract tests
// ===========================================================================

#[tokio::test]
async fn ledger_append_then_query_includes_record() {
    let ledger = ledger();
    let record = sample_record("agent-1", AuditOperation::Write);
    let audit_id = record.audit_id;

    let signature = ledger.append(record).await.unwrap();
    assert!(!signature.is_empty());

    let records = ledger.query(&AuditFilters::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].audit_id, audit_id);
    assert_eq!(records[0].signature, signature);
}

#[tokio::test]
async fn ledger_records_verify_after_query() {
    let ledger = ledger();
    ledger
        .append(sample_record("agent-1", AuditOperation::Read))
        .await
        .unwrap();

    let records = ledger.query(&AuditFilters::default()).await.unwrap();
    for record in &records {
        ledger.verify(record).await.unwrap();
    }
}

#[tokio::test]
async fn ledger_detects_tampered_record() {
    let ledger = ledger();
    ledger
        .append(sample_record("agent-1", AuditOperation::Read))
        .await
        .unwrap();

    let mut record = ledger.query(&AuditFilters::default()).await.unwrap()[0].clone();
    record.reason = "rewritten after the fact".to_string();

    let err = ledger.verify(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::IntegrityFailure { .. }));
}

#[tokio::test]
async fn ledger_orders_by_timestamp_then_insertion() {
    let ledger = ledger();
    for i in 0..5 {
        ledger
            .append(sample_record(&format!("agent-{i}"), AuditOperation::Write))
            .await
            .unwrap();
    }

    let records = ledger.query(&AuditFilters::default()).await.unwrap();
    assert_eq!(records.len(), 5);
    for pair in records.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    // Appends happened in agent order; near-identical timestamps must not
    // reorder them.
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.agent_id, format!("agent-{i}"));
    }
}

#[tokio::test]
async fn ledger_filters_by_agent() {
    let ledger = ledger();
    ledger
        .append(sample_record("agent-1", AuditOperation::Write))
        .await
        .unwrap();
    ledger
        .append(sample_record("agent-2", AuditOperation::Write))
        .await
        .unwrap();

    let records = ledger.query(&AuditFilters::for_agent("agent-1")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].agent_id, "agent-1");
}

#[tokio::test]
async fn ledger_filters_by_operation_and_limit() {
    let ledger = ledger();
    ledger
        .append(sample_record("agent-1", AuditOperation::Write))
        .await
        .unwrap();
    ledger
        .append(sample_record("agent-1", AuditOperation::Disable))
        .await
        .unwrap();
    ledger
        .append(sample_record("agent-1", AuditOperation::Write))
        .await
        .unwrap();

    let writes = ledger
        .query(&AuditFilters {
            operation: Some(AuditOperation::Write),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(writes.len(), 2);

    let limited = ledger
        .query(&AuditFilters {
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn ledger_filters_by_time_window() {
    let ledger = ledger();
    ledger
        .append(sample_record("agent-1", AuditOperation::Write))
        .await
        .unwrap();

    let future_only = AuditFilters {
        start: Some(Utc::now() + Duration::hours(1)),
        ..Default::default()
    };
    assert!(ledger.query(&future_only).await.unwrap().is_empty());

    let covering = AuditFilters {
        start: Some(Utc::now() - Duration::hours(1)),
        end: Some(Utc::now() + Duration::hours(1)),
        ..Default::default()
    };
    assert_eq!(ledger.query(&covering).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failing_ledger_rejects_appends() {
    let ledger = FailingAuditLedger;
    let err = ledger
        .append(sample_record("agent-1", AuditOperation::Write))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AppendRejected(_)));
}

// ===========================================================================
// AgentStateStore contract tests
// ===========================================================================

#[tokio::test]
async fn state_store_defaults_to_enabled() {
    let store = InMemoryAgentStateStore::new();
    let status = store.get("agent-1").await.unwrap();
    assert_eq!(status.state, AgentState::Enabled);
    assert!(status.changed_at.is_none());
}

#[tokio::test]
async fn state_store_set_is_visible_to_next_get() {
    let store = InMemoryAgentStateStore::new();
    store
        .set(AgentStatus {
            agent_id: "agent-1".to_string(),
            state: AgentState::Disabled,
            changed_at: Some(Utc::now()),
            reason: Some("incident".to_string()),
            actor_id: Some("admin".to_string()),
        })
        .await
        .unwrap();

    let status = store.get("agent-1").await.unwrap();
    assert_eq!(status.state, AgentState::Disabled);
}

#[tokio::test]
async fn state_store_lists_observed_agents() {
    let store = InMemoryAgentStateStore::new();
    store.get("agent-b").await.unwrap();
    store.get("agent-a").await.unwrap();

    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].agent_id, "agent-a");
    assert_eq!(all[1].agent_id, "agent-b");
}

// ===========================================================================
// StorageAdapter contract tests
// ===========================================================================

#[tokio::test]
async fn adapter_write_then_read_round_trip() {
    let (adapter, _) = adapter_with_ledger();
    let memory = memory_for("agent-1", Scope::Agent, 3600);
    let memory_id = memory.memory_id;
    let content = memory.content.clone();

    let write_audit = adapter.write(memory, write_ctx()).await.unwrap();
    assert_eq!(write_audit.operation, AuditOperation::Write);
    assert_eq!(write_audit.decision, AuditDecision::Allowed);
    assert!(!write_audit.signature.is_empty());

    let check = PolicyCheck::for_agent("agent-1");
    let (read, read_audit) = adapter.read(memory_id, "agent-1", &check).await.unwrap();
    assert_eq!(read.unwrap().content, content);
    assert_eq!(read_audit.decision, AuditDecision::Allowed);
}

#[tokio::test]
async fn adapter_rejects_unsound_rows() {
    let (adapter, _) = adapter_with_ledger();

    let mut no_agent = memory_for("agent-1", Scope::Agent, 3600);
    no_agent.agent_id = "".to_string();
    assert!(adapter.write(no_agent, write_ctx()).await.is_err());

    let mut bad_ttl = memory_for("agent-1", Scope::Agent, 3600);
    bad_ttl.policy.ttl_seconds = 0;
    assert!(adapter.write(bad_ttl, write_ctx()).await.is_err());
}

#[tokio::test]
async fn adapter_read_absent_returns_denied_audit() {
    let (adapter, _) = adapter_with_ledger();
    let check = PolicyCheck::for_agent("agent-1");

    let (read, audit) = adapter
        .read(MemoryId::new(), "agent-1", &check)
        .await
        .unwrap();
    assert!(read.is_none());
    assert_eq!(audit.decision, AuditDecision::Denied);
    assert_eq!(audit.reason, "memory_not_found");
}

#[tokio::test]
async fn adapter_read_expired_is_denied() {
    let (adapter, _) = adapter_with_ledger();
    let draft = MemoryDraft::new(
        "agent-1",
        "stale observation",
        MemoryType::LongTerm,
        Sensitivity::NonPii,
        Scope::Agent,
    );
    // Created an hour ago with a 60s TTL: long expired.
    let memory = Memory::from_draft(draft, 60, Utc::now() - Duration::hours(1), "req-1");
    let memory_id = memory.memory_id;
    adapter.write(memory, write_ctx()).await.unwrap();

    let check = PolicyCheck::for_agent("agent-1");
    let (read, audit) = adapter.read(memory_id, "agent-1", &check).await.unwrap();
    assert!(read.is_none());
    assert_eq!(audit.reason, "expired");
}

#[tokio::test]
async fn adapter_read_enforces_agent_isolation() {
    let (adapter, _) = adapter_with_ledger();
    let memory = memory_for("agent-1", Scope::Agent, 3600);
    let memory_id = memory.memory_id;
    adapter.write(memory, write_ctx()).await.unwrap();

    let check = PolicyCheck::for_agent("agent-2");
    let (read, audit) = adapter.read(memory_id, "agent-2", &check).await.unwrap();
    assert!(read.is_none());
    assert_eq!(audit.decision, AuditDecision::Denied);
    assert_eq!(audit.reason, "isolation_violation");
}

#[tokio::test]
async fn adapter_read_shares_tenant_scope() {
    let (adapter, _) = adapter_with_ledger();
    let memory = memory_for("agent-1", Scope::Tenant, 3600);
    let memory_id = memory.memory_id;
    adapter.write(memory, write_ctx()).await.unwrap();

    let check = PolicyCheck::for_agent("agent-2");
    let (read, _) = adapter.read(memory_id, "agent-2", &check).await.unwrap();
    assert!(read.is_some());
}

#[tokio::test]
async fn adapter_query_never_returns_foreign_agent_memory() {
    let (adapter, _) = adapter_with_ledger();
    adapter
        .write(memory_for("agent-1", Scope::Agent, 3600), write_ctx())
        .await
        .unwrap();
    adapter
        .write(memory_for("agent-1", Scope::Tenant, 3600), write_ctx())
        .await
        .unwrap();

    let check = PolicyCheck::for_agent("agent-2");
    let (results, audit) = adapter
        .query(&MemoryFilters::default(), "agent-2", &check)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].policy.scope, Scope::Tenant);
    assert_eq!(audit.metadata["filtered_unauthorized"], json!(1));
}

#[tokio::test]
async fn adapter_query_counts_expired_separately() {
    let (adapter, _) = adapter_with_ledger();
    let expired = Memory::from_draft(
        MemoryDraft::new(
            "agent-1",
            "old",
            MemoryType::LongTerm,
            Sensitivity::NonPii,
            Scope::Agent,
        ),
        60,
        Utc::now() - Duration::hours(1),
        "req-1",
    );
    adapter.write(expired, write_ctx()).await.unwrap();
    adapter
        .write(memory_for("agent-1", Scope::Agent, 3600), write_ctx())
        .await
        .unwrap();
    adapter
        .write(memory_for("agent-2", Scope::Agent, 3600), write_ctx())
        .await
        .unwrap();

    let check = PolicyCheck::for_agent("agent-1");
    let (results, audit) = adapter
        .query(&MemoryFilters::default(), "agent-1", &check)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(audit.metadata["total_examined"], json!(3));
    assert_eq!(audit.metadata["filtered_expired"], json!(1));
    assert_eq!(audit.metadata["filtered_unauthorized"], json!(1));
    assert_eq!(audit.decision, AuditDecision::Filtered);
}

#[tokio::test]
async fn adapter_query_orders_most_recent_first() {
    let (adapter, _) = adapter_with_ledger();
    let now = Utc::now();
    for (i, age) in [3600i64, 60, 600].iter().enumerate() {
        let draft = MemoryDraft::new(
            "agent-1",
            format!("observation {i}"),
            MemoryType::LongTerm,
            Sensitivity::NonPii,
            Scope::Agent,
        );
        let memory = Memory::from_draft(draft, 86_400, now - Duration::seconds(*age), "req-1");
        adapter.write(memory, write_ctx()).await.unwrap();
    }

    let check = PolicyCheck::for_agent("agent-1");
    let (results, _) = adapter
        .query(&MemoryFilters::default(), "agent-1", &check)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[tokio::test]
async fn adapter_query_applies_request_filters() {
    let (adapter, _) = adapter_with_ledger();
    let mut episodic = memory_for("agent-1", Scope::Agent, 3600);
    episodic.policy.memory_type = MemoryType::Episodic;
    adapter.write(episodic, write_ctx()).await.unwrap();
    adapter
        .write(memory_for("agent-1", Scope::Agent, 3600), write_ctx())
        .await
        .unwrap();

    let filters = MemoryFilters {
        memory_types: Some(vec![MemoryType::Episodic]),
        ..Default::default()
    };
    let check = PolicyCheck::for_agent("agent-1");
    let (results, audit) = adapter.query(&filters, "agent-1", &check).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].policy.memory_type, MemoryType::Episodic);
    assert_eq!(audit.metadata["filtered_by_request"], json!(1));
}

#[tokio::test]
async fn adapter_delete_is_hard_and_fails_when_absent() {
    let (adapter, _) = adapter_with_ledger();
    let memory = memory_for("agent-1", Scope::Agent, 3600);
    let memory_id = memory.memory_id;
    adapter.write(memory, write_ctx()).await.unwrap();

    let audit = adapter
        .delete(memory_id, "admin", "compliance_purge")
        .await
        .unwrap();
    assert_eq!(audit.operation, AuditOperation::Delete);
    assert_eq!(audit.actor_id, "admin");

    // Gone for reads.
    let check = PolicyCheck::for_agent("agent-1");
    let (read, _) = adapter.read(memory_id, "agent-1", &check).await.unwrap();
    assert!(read.is_none());

    // Deleting again is an error, not a silent no-op.
    let err = adapter
        .delete(memory_id, "admin", "compliance_purge")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn adapter_audit_log_is_a_ledger_passthrough() {
    let (adapter, ledger) = adapter_with_ledger();
    adapter
        .write(memory_for("agent-1", Scope::Agent, 3600), write_ctx())
        .await
        .unwrap();

    let via_adapter = adapter
        .get_audit_log(&AuditFilters::default())
        .await
        .unwrap();
    let via_ledger = ledger.query(&AuditFilters::default()).await.unwrap();
    assert_eq!(via_adapter, via_ledger);
    assert_eq!(via_adapter.len(), 1);
}

#[tokio::test]
async fn adapter_write_fails_closed_without_audit() {
    let adapter =
        InMemoryStorageAdapter::new(Arc::new(FailingAuditLedger), PolicyEngine::default());
    let memory = memory_for("agent-1", Scope::Agent, 3600);
    let memory_id = memory.memory_id;

    let err = adapter.write(memory, write_ctx()).await.unwrap_err();
    assert!(matches!(err, StorageError::AppendRejected(_)));

    // The memory must not be observable either: reads against a failing
    // ledger also fail rather than answering unaudited.
    let check = PolicyCheck::for_agent("agent-1");
    assert!(adapter.read(memory_id, "agent-1", &check).await.is_err());
}

#[tokio::test]
async fn adapter_health_check_reports_healthy() {
    let (adapter, _) = adapter_with_ledger();
    assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Healthy);
}

// ===========================================================================
// Signature verification across the signer boundary
// ===========================================================================

#[tokio::test]
async fn independent_signer_with_same_key_verifies_ledger_records() {
    let key = b"contract-test-key".to_vec();
    let ledger = Arc::new(InMemoryAuditLedger::new(Arc::new(HmacRecordSigner::new(
        key.clone(),
    ))));
    ledger
        .append(sample_record("agent-1", AuditOperation::Write))
        .await
        .unwrap();

    let records = ledger.query(&AuditFilters::default()).await.unwrap();
    let external = HmacRecordSigner::new(key);
    external.verify(&records[0]).unwrap();
}
