//! Governed context builder — the single gateway for agent memory reads.
//!
//! Enforcement pipeline, in order, each step able to short-circuit to a
//! denial:
//!
//! 1. Agent identity validation
//! 2. Kill switch check (frozen agents may read; disabled may not)
//! 3. Memory-type filtering
//! 4. TTL enforcement
//! 5. Sensitivity / read-permission filtering
//! 6. Scope isolation
//! 7. Token and item budget
//! 8. Audit logging (one summarising record per build)
//!
//! Steps 3–6 run inside the storage adapter so unauthorized rows never
//! cross its boundary; the builder enforces identity, kill switch, and
//! budget, then appends the summary record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use memgov_domain::{
    AuditDecision, AuditOperation, AuditRecord, GovernanceError, Memory, Operation, PolicyCheck,
    Result, POLICY_VERSION,
};
use memgov_state::{AuditLedger, MemoryFilters, StorageAdapter};

use crate::kill_switch::KillSwitch;
use crate::obs;

/// Fixed per-item overhead added to the whitespace token estimate.
const ITEM_TOKEN_OVERHEAD: usize = 10;

/// Rough token count for one memory: word count plus metadata overhead.
fn estimated_tokens(memory: &Memory) -> usize {
    memory.content.split_whitespace().count() + ITEM_TOKEN_OVERHEAD
}

/// Request for governed context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRequest {
    pub agent_id: String,
    pub request_id: String,
    pub filters: MemoryFilters,
    pub max_tokens: usize,
    pub max_items: usize,
}

impl ContextRequest {
    /// A request with the default context budget (4000 tokens, 50 items).
    pub fn new(agent_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        ContextRequest {
            agent_id: agent_id.into(),
            request_id: request_id.into(),
            filters: MemoryFilters::default(),
            max_tokens: 4000,
            max_items: 50,
        }
    }

    /// Restrict the query (builder pattern).
    pub fn with_filters(mut self, filters: MemoryFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Override the context budget (builder pattern).
    pub fn with_budget(mut self, max_tokens: usize, max_items: usize) -> Self {
        self.max_tokens = max_tokens;
        self.max_items = max_items;
        self
    }
}

/// Filtering and budget accounting for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub token_count: usize,
    pub returned_count: usize,
    pub total_examined: u64,
    pub filtered_expired: u64,
    pub filtered_unauthorized: u64,
    pub filtered_over_budget: u64,
    pub audit_id: Uuid,
    pub policy_version: String,
}

/// Context returned to an agent — already filtered by policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernedContext {
    pub agent_id: String,
    pub request_id: String,
    pub memories: Vec<Memory>,
    pub metadata: ContextMetadata,
}

/// Builds and serves context with governance enforced before anything
/// reaches the agent.
#[derive(Clone)]
pub struct ContextBuilder {
    storage: Arc<dyn StorageAdapter>,
    kill_switch: KillSwitch,
    ledger: Arc<dyn AuditLedger>,
}

impl ContextBuilder {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        kill_switch: KillSwitch,
        ledger: Arc<dyn AuditLedger>,
    ) -> Self {
        ContextBuilder {
            storage,
            kill_switch,
            ledger,
        }
    }

    /// Build context for an agent.
    ///
    /// Deterministic per call given current store state: identical
    /// requests against an unchanged store return identical memories and
    /// filter counts.
    ///
    /// # Errors
    ///
    /// `AgentDisabled` if the kill switch blocks the agent (disabled
    /// blocks reads too — only frozen agents retain read access);
    /// `InvalidPolicy` for a malformed agent id; `Storage` if the audit
    /// record cannot be written (fail closed).
    pub async fn build(&self, request: &ContextRequest) -> Result<GovernedContext> {
        let span = obs::request_span(&request.agent_id, &request.request_id);
        self.build_inner(request).instrument(span).await
    }

    async fn build_inner(&self, request: &ContextRequest) -> Result<GovernedContext> {
        // Step 1: identity.
        if request.agent_id.trim().is_empty() {
            return Err(GovernanceError::InvalidPolicy(
                "agent_id must not be empty".into(),
            ));
        }

        // Step 2: kill switch, audited on denial.
        if let Err(err) = self
            .kill_switch
            .check_allowed(&request.agent_id, Operation::Read)
            .await
        {
            self.audit_denied_build(request, &err).await?;
            return Err(err);
        }

        // Steps 3–6: retrieval guard inside the storage boundary.
        let check = PolicyCheck::for_agent(&request.agent_id);
        let (candidates, query_audit) = self
            .storage
            .query(&request.filters, &request.agent_id, &check)
            .await?;

        let total_examined = metadata_count(&query_audit, "total_examined");
        let filtered_expired = metadata_count(&query_audit, "filtered_expired");
        let filtered_unauthorized = metadata_count(&query_audit, "filtered_unauthorized");

        // Step 7: greedy budget in the adapter's stable order. Items past
        // the cutoff are excluded whole and counted, never truncated.
        let mut memories: Vec<Memory> = Vec::new();
        let mut token_count = 0usize;
        let mut filtered_over_budget = 0u64;
        for memory in candidates {
            let tokens = estimated_tokens(&memory);
            if memories.len() >= request.max_items || token_count + tokens > request.max_tokens {
                filtered_over_budget += 1;
                continue;
            }
            token_count += tokens;
            memories.push(memory);
        }

        // Step 8: exactly one summarising record for this build.
        let mut summary = AuditRecord::new(
            &request.agent_id,
            &request.request_id,
            AuditOperation::Query,
            None,
            POLICY_VERSION,
            AuditDecision::Filtered,
            "context_built",
            &request.agent_id,
            json!({
                "total_examined": total_examined,
                "filtered_expired": filtered_expired,
                "filtered_unauthorized": filtered_unauthorized,
                "filtered_over_budget": filtered_over_budget,
                "returned_count": memories.len() as u64,
                "token_count": token_count as u64,
            }),
        );
        summary.signature = self.ledger.append(summary.clone()).await?;

        let returned_count = memories.len();
        obs::emit_context_built(
            &request.agent_id,
            &request.request_id,
            returned_count,
            filtered_expired + filtered_unauthorized + filtered_over_budget,
            token_count,
        );

        Ok(GovernedContext {
            agent_id: request.agent_id.clone(),
            request_id: request.request_id.clone(),
            memories,
            metadata: ContextMetadata {
                token_count,
                returned_count,
                total_examined,
                filtered_expired,
                filtered_unauthorized,
                filtered_over_budget,
                audit_id: summary.audit_id,
                policy_version: POLICY_VERSION.to_string(),
            },
        })
    }

    async fn audit_denied_build(
        &self,
        request: &ContextRequest,
        err: &GovernanceError,
    ) -> Result<()> {
        let reason = match err.deny_reason() {
            Some(reason) => reason.to_string(),
            None => "agent_disabled".to_string(),
        };
        let record = AuditRecord::new(
            &request.agent_id,
            &request.request_id,
            AuditOperation::Query,
            None,
            POLICY_VERSION,
            AuditDecision::Denied,
            reason,
            &request.agent_id,
            json!({}),
        );
        self.ledger.append(record).await?;
        Ok(())
    }
}

fn metadata_count(record: &AuditRecord, key: &str) -> u64 {
    record
        .metadata
        .get(key)
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memgov_domain::{MemoryDraft, MemoryType, Scope, Sensitivity};

    fn memory_with_words(words: usize) -> Memory {
        let content = vec!["token"; words].join(" ");
        let draft = MemoryDraft::new(
            "agent-1",
            content,
            MemoryType::LongTerm,
            Sensitivity::NonPii,
            Scope::Agent,
        );
        Memory::from_draft(draft, 3600, Utc::now(), "req-1")
    }

    #[test]
    fn test_token_estimate_counts_words_plus_overhead() {
        assert_eq!(estimated_tokens(&memory_with_words(5)), 15);
        assert_eq!(estimated_tokens(&memory_with_words(0)), 10);
    }

    #[test]
    fn test_request_defaults() {
        let request = ContextRequest::new("agent-1", "req-1");
        assert_eq!(request.max_tokens, 4000);
        assert_eq!(request.max_items, 50);
        assert_eq!(request.filters, MemoryFilters::default());
    }

    #[test]
    fn test_request_budget_builder() {
        let request = ContextRequest::new("agent-1", "req-1").with_budget(100, 2);
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.max_items, 2);
    }
}
