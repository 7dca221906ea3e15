//! Structured observability hooks for governance pipeline events.
//!
//! This module provides:
//! - Request-scoped tracing spans via [`request_span`], attached to the
//!   async pipeline with `tracing::Instrument` (never held across awaits)
//! - Emission functions for key decision points: context built, memory
//!   recorded, write denied, kill-switch transitions, global shutdown
//!
//! Events are emitted at `info!` level and carry an `event = "..."` field
//! for log aggregation. For JSON output, initialise via
//! [`crate::telemetry::init_tracing`] with `json = true`.

use memgov_domain::AgentState;
use tracing::info;

/// Span covering one governed request through the pipeline.
pub fn request_span(agent_id: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!("memgov.request", agent_id = %agent_id, request_id = %request_id)
}

/// Emit event: governed context built and returned to an agent.
pub fn emit_context_built(
    agent_id: &str,
    request_id: &str,
    returned: usize,
    filtered: u64,
    token_count: usize,
) {
    info!(
        event = "context.built",
        agent_id = %agent_id,
        request_id = %request_id,
        returned = returned,
        filtered = filtered,
        token_count = token_count,
    );
}

/// Emit event: memory accepted and persisted.
pub fn emit_memory_recorded(agent_id: &str, memory_id: &str, ttl_seconds: i64) {
    info!(
        event = "memory.recorded",
        agent_id = %agent_id,
        memory_id = %memory_id,
        ttl_seconds = ttl_seconds,
    );
}

/// Emit event: a write was denied (warning level — denials are expected
/// but worth surfacing).
pub fn emit_write_denied(agent_id: &str, reason: &str) {
    tracing::warn!(event = "memory.write_denied", agent_id = %agent_id, reason = %reason);
}

/// Emit event: a kill-switch transition was applied.
pub fn emit_kill_switch_transition(agent_id: &str, state: AgentState, actor_id: &str) {
    info!(
        event = "kill_switch.transition",
        agent_id = %agent_id,
        state = %state,
        actor_id = %actor_id,
    );
}

/// Emit event: global shutdown swept all known agents.
pub fn emit_global_shutdown(actor_id: &str, disabled_count: usize) {
    tracing::warn!(
        event = "kill_switch.global_shutdown",
        actor_id = %actor_id,
        disabled_count = disabled_count,
    );
}
