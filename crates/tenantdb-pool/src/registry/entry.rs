//! Cached pool entries and eviction bookkeeping

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Lifecycle state of a pool entry
///
/// Only `Ready` entries live in the registry; `Creating` is tracked by the
/// creation coordinator and `Evicting`/`Closed` entries have already been
/// removed from the lookup path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Creating,
    Ready,
    Evicting,
    Closed,
}

/// Why a pool left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Displaced by a new pool when the registry was full
    LruCapacity,
    /// Idle for at least the configured TTL
    TtlExpired,
    /// Closed by `dispose()`
    ManagerDisposed,
    /// The factory reported the pool as unusable
    HealthCheckFailed,
    /// Evicted explicitly by a caller
    Manual,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::LruCapacity => "lru_capacity",
            EvictionReason::TtlExpired => "ttl_expired",
            EvictionReason::ManagerDisposed => "manager_disposed",
            EvictionReason::HealthCheckFailed => "health_check_failed",
            EvictionReason::Manual => "manual",
        }
    }
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached pool for one tenant
pub struct PoolEntry<P> {
    tenant_id: String,
    pool: Arc<P>,
    schema_name: String,
    created_at: Instant,
    last_accessed_at: Instant,
    state: EntryState,
}

impl<P> PoolEntry<P> {
    pub(crate) fn new(tenant_id: String, pool: Arc<P>, schema_name: String, now: Instant) -> Self {
        Self {
            tenant_id,
            pool,
            schema_name,
            created_at: now,
            last_accessed_at: now,
            state: EntryState::Ready,
        }
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> Instant {
        self.last_accessed_at
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    /// Whether the entry has been idle for at least `ttl`
    pub(crate) fn is_expired(&self, ttl: std::time::Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_accessed_at) >= ttl
    }

    /// Take the entry off the lookup path
    pub(crate) fn into_evicted(mut self, reason: EvictionReason) -> EvictedPool<P> {
        self.state = EntryState::Evicting;
        EvictedPool {
            entry: self,
            reason,
        }
    }
}

impl<P> fmt::Debug for PoolEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("tenant_id", &self.tenant_id)
            .field("schema_name", &self.schema_name)
            .field("created_at", &self.created_at)
            .field("last_accessed_at", &self.last_accessed_at)
            .field("state", &self.state)
            .finish()
    }
}

/// An entry removed from the registry whose pool still has to be closed
pub struct EvictedPool<P> {
    entry: PoolEntry<P>,
    reason: EvictionReason,
}

impl<P> EvictedPool<P> {
    pub fn tenant_id(&self) -> &str {
        &self.entry.tenant_id
    }

    pub fn schema_name(&self) -> &str {
        &self.entry.schema_name
    }

    pub fn reason(&self) -> EvictionReason {
        self.reason
    }

    pub fn state(&self) -> EntryState {
        self.entry.state
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.entry.pool
    }

    pub(crate) fn mark_closed(&mut self) {
        self.entry.state = EntryState::Closed;
    }
}

impl<P> fmt::Debug for EvictedPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvictedPool")
            .field("entry", &self.entry)
            .field("reason", &self.reason)
            .finish()
    }
}
