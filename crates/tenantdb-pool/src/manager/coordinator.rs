//! Single-flight bookkeeping for pool creation
//!
//! Each tenant has at most one creation in flight. Waiters share one
//! [`Shared`] future; the map only keeps a weak handle, so when every waiter
//! has gone away the creation future is dropped and the next caller starts
//! a fresh one.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared, WeakShared};
use tenantdb_core::Result;

/// The future producing a tenant's pool
pub(crate) type CreationFuture<P> = BoxFuture<'static, Result<Arc<P>>>;

/// A waiter's handle on an in-flight creation
pub(crate) type SharedCreation<P> = Shared<CreationFuture<P>>;

struct InFlight<P> {
    generation: u64,
    creation: WeakShared<CreationFuture<P>>,
}

/// Map of tenant id to in-flight creation
///
/// Lives under the same mutex as the registry.
pub(crate) struct InFlightCreations<P> {
    entries: HashMap<String, InFlight<P>>,
    next_generation: u64,
}

impl<P> InFlightCreations<P> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Join the tenant's creation if one is still alive
    ///
    /// Entries whose waiters have all been dropped are discarded.
    pub(crate) fn join(&mut self, tenant_id: &str) -> Option<SharedCreation<P>> {
        let upgraded = self.entries.get(tenant_id)?.creation.upgrade();
        if upgraded.is_none() {
            tracing::debug!(tenant_id, "discarding abandoned pool creation");
            self.entries.remove(tenant_id);
        }
        upgraded
    }

    /// Reserve a generation number for a new creation
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Record a newly started creation
    pub(crate) fn register(
        &mut self,
        tenant_id: &str,
        generation: u64,
        creation: &SharedCreation<P>,
    ) {
        if let Some(weak) = creation.downgrade() {
            self.entries.insert(
                tenant_id.to_string(),
                InFlight {
                    generation,
                    creation: weak,
                },
            );
        }
    }

    /// Forget a settled creation
    ///
    /// Only the entry installed with `generation` is removed; a newer
    /// creation for the same tenant is left alone.
    pub(crate) fn finish(&mut self, tenant_id: &str, generation: u64) {
        if self
            .entries
            .get(tenant_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            self.entries.remove(tenant_id);
        }
    }

    /// Strong handles for every creation that still has waiters
    ///
    /// Drop the result outside the lock: releasing the last handle drops the
    /// creation future.
    pub(crate) fn live(&self) -> Vec<SharedCreation<P>> {
        self.entries
            .values()
            .filter_map(|entry| entry.creation.upgrade())
            .collect()
    }

    /// A strong handle on the tenant's creation, if it still has waiters
    pub(crate) fn upgrade(&self, tenant_id: &str) -> Option<SharedCreation<P>> {
        self.entries.get(tenant_id)?.creation.upgrade()
    }
}
