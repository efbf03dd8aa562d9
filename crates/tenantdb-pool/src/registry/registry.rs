//! Bounded, tenant-keyed cache of live pools

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tenantdb_core::{PoolManagerError, Result};
use tokio::time::Instant;

use super::entry::{EvictedPool, EvictionReason, PoolEntry};

/// Cache of ready pools with LRU and TTL eviction
///
/// The registry is plain data. The manager keeps it behind a single mutex
/// together with the in-flight creation map, and never holds that mutex
/// across an await point: removal hands back [`EvictedPool`]s which are
/// closed after the lock is released.
pub struct PoolRegistry<P> {
    entries: HashMap<String, PoolEntry<P>>,
    /// Maximum number of cached pools
    capacity: usize,
    /// Idle time after which an entry expires; zero disables expiry
    ttl: Duration,
    disposed: bool,
}

impl<P> PoolRegistry<P> {
    /// Create an empty registry
    ///
    /// A zero `capacity` is raised to 1.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            disposed: false,
        }
    }

    /// Look up a tenant's pool, refreshing its access time on a hit
    pub fn lookup(&mut self, tenant_id: &str, now: Instant) -> Option<Arc<P>> {
        let entry = self.entries.get_mut(tenant_id)?;
        entry.touch(now);
        Some(Arc::clone(entry.pool()))
    }

    /// Look up an entry without touching it
    pub fn peek(&self, tenant_id: &str) -> Option<&PoolEntry<P>> {
        self.entries.get(tenant_id)
    }

    /// Insert a freshly created pool.
    ///
    /// Expired entries are evicted first. If the registry is still full, the
    /// least recently used entry is evicted (oldest `created_at` breaks ties).
    /// Returns the evictions the caller must close once the lock is released.
    ///
    /// An existing entry for the same tenant is replaced and handed back as a
    /// `Manual` eviction, keeping at most one ready pool per tenant.
    pub fn insert(
        &mut self,
        tenant_id: &str,
        pool: Arc<P>,
        schema_name: String,
        now: Instant,
    ) -> Result<Vec<EvictedPool<P>>> {
        if self.disposed {
            return Err(PoolManagerError::Disposed);
        }

        let mut evicted = Vec::new();
        if let Some(previous) = self.entries.remove(tenant_id) {
            evicted.push(previous.into_evicted(EvictionReason::Manual));
        }

        if self.entries.len() >= self.capacity {
            evicted.extend(self.take_expired(now));
        }

        while self.entries.len() >= self.capacity {
            match self.lru_candidate() {
                Some(victim) => {
                    if let Some(entry) = self.remove(&victim, EvictionReason::LruCapacity) {
                        evicted.push(entry);
                    }
                }
                None => break,
            }
        }

        self.entries.insert(
            tenant_id.to_string(),
            PoolEntry::new(tenant_id.to_string(), pool, schema_name, now),
        );

        Ok(evicted)
    }

    /// Remove a tenant's entry, if present
    pub fn remove(&mut self, tenant_id: &str, reason: EvictionReason) -> Option<EvictedPool<P>> {
        self.entries
            .remove(tenant_id)
            .map(|entry| entry.into_evicted(reason))
    }

    /// Remove an entry only if it still holds `pool`
    ///
    /// Used when a decision was made outside the lock (e.g. a failed health
    /// check) and the entry may have been replaced in the meantime.
    pub fn remove_if_same(
        &mut self,
        tenant_id: &str,
        pool: &Arc<P>,
        reason: EvictionReason,
    ) -> Option<EvictedPool<P>> {
        let same = self
            .entries
            .get(tenant_id)
            .is_some_and(|entry| Arc::ptr_eq(entry.pool(), pool));
        if same {
            self.remove(tenant_id, reason)
        } else {
            None
        }
    }

    /// Remove every entry idle for at least the TTL
    pub fn take_expired(&mut self, now: Instant) -> Vec<EvictedPool<P>> {
        if self.ttl.is_zero() {
            return Vec::new();
        }

        let ttl = self.ttl;
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(ttl, now))
            .map(|entry| entry.tenant_id().to_string())
            .collect();

        expired
            .iter()
            .filter_map(|tenant_id| self.remove(tenant_id, EvictionReason::TtlExpired))
            .collect()
    }

    /// Remove every entry
    pub fn drain(&mut self, reason: EvictionReason) -> Vec<EvictedPool<P>> {
        self.entries
            .drain()
            .map(|(_, entry)| entry.into_evicted(reason))
            .collect()
    }

    /// Refuse further inserts and remove every entry
    pub fn dispose(&mut self) -> Vec<EvictedPool<P>> {
        self.disposed = true;
        self.drain(EvictionReason::ManagerDisposed)
    }

    /// The entry to evict for capacity: smallest `last_accessed_at`,
    /// then smallest `created_at`
    fn lru_candidate(&self) -> Option<String> {
        self.entries
            .values()
            .min_by_key(|entry| (entry.last_accessed_at(), entry.created_at()))
            .map(|entry| entry.tenant_id().to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tenant_id: &str) -> bool {
        self.entries.contains_key(tenant_id)
    }

    pub fn tenant_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Snapshot of `(tenant_id, pool)` pairs
    pub fn pools(&self) -> Vec<(String, Arc<P>)> {
        self.entries
            .values()
            .map(|entry| (entry.tenant_id().to_string(), Arc::clone(entry.pool())))
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
