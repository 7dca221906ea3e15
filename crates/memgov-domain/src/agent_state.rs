//! Agent execution state — the permission axis for the kill switch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent execution state as a single tagged enum.
///
/// One enum rather than independent flags, so combinations like
/// "disabled but writes allowed" are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Enabled,
    /// All operations blocked. Reversed only by an explicit enable.
    Disabled,
    /// Writes blocked, reads permitted (human-in-the-loop mode).
    Frozen,
}

impl AgentState {
    /// Whether the given operation is permitted in this state.
    pub fn permits(&self, operation: Operation) -> bool {
        match self {
            AgentState::Enabled => true,
            AgentState::Disabled => false,
            AgentState::Frozen => matches!(operation, Operation::Read),
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Enabled => write!(f, "enabled"),
            AgentState::Disabled => write!(f, "disabled"),
            AgentState::Frozen => write!(f, "frozen"),
        }
    }
}

/// Memory operation class checked against agent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    /// Requires the agent to be fully enabled.
    All,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
            Operation::All => write!(f, "all"),
        }
    }
}

/// Current status of an agent as held by the authoritative state store.
///
/// `changed_at` / `reason` / `actor_id` describe the most recent kill-switch
/// transition; all three are `None` for agents never touched by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub state: AgentState,
    pub changed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub actor_id: Option<String>,
}

impl AgentStatus {
    /// The implicit status of an agent on first observation.
    pub fn enabled(agent_id: impl Into<String>) -> Self {
        AgentStatus {
            agent_id: agent_id.into(),
            state: AgentState::Enabled,
            changed_at: None,
            reason: None,
            actor_id: None,
        }
    }
}
