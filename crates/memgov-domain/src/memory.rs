//! Governed memory items and their policy contracts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a memory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Generate a new random MemoryId.
    pub fn new() -> Self {
        MemoryId(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memory retention class.
///
/// `ShortTerm` is request-scoped only and must never reach persistent
/// storage; the policy engine rejects writes of this class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    ShortTerm,
    LongTerm,
    Episodic,
}

impl MemoryType {
    /// Whether this class may be persisted beyond the request.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, MemoryType::ShortTerm)
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::ShortTerm => write!(f, "short_term"),
            MemoryType::LongTerm => write!(f, "long_term"),
            MemoryType::Episodic => write!(f, "episodic"),
        }
    }
}

/// Sensitivity classification. Drives default retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Pii,
    NonPii,
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Pii => write!(f, "pii"),
            Sensitivity::NonPii => write!(f, "non_pii"),
        }
    }
}

/// Visibility boundary for a memory item.
///
/// `Agent` is strictly isolated to the owning agent; `Tenant` is shared
/// across agents within the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Agent,
    Tenant,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Agent => write!(f, "agent"),
            Scope::Tenant => write!(f, "tenant"),
        }
    }
}

/// Governance contract attached to a memory item at write time.
///
/// Defines how the item is retained and who may see it. The policy is
/// validated once on write and then enforced on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPolicy {
    pub memory_type: MemoryType,
    pub sensitivity: Sensitivity,
    pub scope: Scope,
    /// Retention duration in seconds. Must be positive for persisted classes.
    pub ttl_seconds: i64,
    pub allow_read: bool,
    pub allow_write: bool,
    /// Source event or request that produced this memory.
    pub provenance: Option<String>,
}

/// A write request before policy approval.
///
/// The draft carries an optional TTL; when absent the policy engine assigns
/// the default for the (sensitivity, scope) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDraft {
    pub agent_id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub sensitivity: Sensitivity,
    pub scope: Scope,
    pub ttl_seconds: Option<i64>,
    pub allow_read: bool,
    pub allow_write: bool,
    pub provenance: Option<String>,
}

impl MemoryDraft {
    /// A readable, writable draft with default permissions.
    pub fn new(
        agent_id: impl Into<String>,
        content: impl Into<String>,
        memory_type: MemoryType,
        sensitivity: Sensitivity,
        scope: Scope,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: content.into(),
            memory_type,
            sensitivity,
            scope,
            ttl_seconds: None,
            allow_read: true,
            allow_write: true,
            provenance: None,
        }
    }

    /// Set an explicit TTL (builder pattern).
    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    /// Set provenance (builder pattern).
    pub fn with_provenance(mut self, provenance: impl Into<String>) -> Self {
        self.provenance = Some(provenance.into());
        self
    }
}

/// A governed memory item with full provenance.
///
/// Content is immutable after creation. Items leave the store via hard
/// delete only; expiry is enforced at read time against `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub memory_id: MemoryId,
    pub agent_id: String,
    pub content: String,
    pub policy: MemoryPolicy,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Request ID or actor that created this item.
    pub created_by: String,
}

impl Memory {
    /// Materialise a memory from an approved draft.
    ///
    /// `effective_ttl` is the TTL the policy engine settled on (explicit or
    /// assigned); `expires_at` is derived from it and never recomputed.
    pub fn from_draft(
        draft: MemoryDraft,
        effective_ttl: i64,
        now: DateTime<Utc>,
        created_by: impl Into<String>,
    ) -> Self {
        Memory {
            memory_id: MemoryId::new(),
            agent_id: draft.agent_id,
            content: draft.content,
            policy: MemoryPolicy {
                memory_type: draft.memory_type,
                sensitivity: draft.sensitivity,
                scope: draft.scope,
                ttl_seconds: effective_ttl,
                allow_read: draft.allow_read,
                allow_write: draft.allow_write,
                provenance: draft.provenance,
            },
            created_at: now,
            expires_at: now + Duration::seconds(effective_ttl),
            created_by: created_by.into(),
        }
    }

    /// A memory is visible at `now` iff `now < expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
