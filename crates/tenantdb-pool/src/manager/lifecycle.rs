//! Lifecycle notifications and orderly closing of evicted pools

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenantdb_core::PoolFactory;
use tokio::time::Instant;

use crate::registry::{EvictedPool, EvictionReason};

/// Polling interval while waiting for callers to release a pool
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Emitted after a tenant pool has been created and cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCreated {
    pub tenant_id: String,
    pub schema_name: String,
    /// Creation tries, including the successful one
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Emitted after an evicted pool has been closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvicted {
    pub tenant_id: String,
    pub schema_name: String,
    pub reason: EvictionReason,
    /// Set when `PoolFactory::close` failed; the entry is gone regardless
    pub close_error: Option<String>,
}

pub type PoolCreatedHook = Arc<dyn Fn(&PoolCreated) -> anyhow::Result<()> + Send + Sync>;
pub type PoolEvictedHook = Arc<dyn Fn(&PoolEvicted) -> anyhow::Result<()> + Send + Sync>;

/// Observers attached to a manager
///
/// Hook errors are logged and never reach the operation that fired them.
#[derive(Clone, Default)]
pub(crate) struct LifecycleHooks {
    pub(crate) on_created: Option<PoolCreatedHook>,
    pub(crate) on_evicted: Option<PoolEvictedHook>,
}

impl LifecycleHooks {
    pub(crate) fn pool_created(&self, event: &PoolCreated) {
        if let Some(hook) = &self.on_created
            && let Err(e) = hook(event)
        {
            tracing::warn!(tenant_id = %event.tenant_id, error = %e, "on_pool_created hook failed");
        }
    }

    pub(crate) fn pool_evicted(&self, event: &PoolEvicted) {
        if let Some(hook) = &self.on_evicted
            && let Err(e) = hook(event)
        {
            tracing::warn!(
                tenant_id = %event.tenant_id,
                reason = %event.reason,
                error = %e,
                "on_pool_evicted hook failed"
            );
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_created", &self.on_created.is_some())
            .field("on_evicted", &self.on_evicted.is_some())
            .finish()
    }
}

/// Wait until the registry's reference is the only one left, or `timeout` passes
async fn wait_for_release<P>(pool: &Arc<P>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Arc::strong_count(pool) > 1 {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    true
}

/// Close one evicted pool and notify the eviction hook.
///
/// `drain_timeout` enables waiting for outstanding handles before closing.
pub(crate) async fn close_evicted_pool<F: PoolFactory>(
    factory: Arc<F>,
    mut evicted: EvictedPool<F::Pool>,
    drain_timeout: Option<Duration>,
    hooks: LifecycleHooks,
) -> PoolEvicted {
    if let Some(timeout) = drain_timeout
        && !wait_for_release(evicted.pool(), timeout).await
    {
        tracing::warn!(
            tenant_id = %evicted.tenant_id(),
            in_use = Arc::strong_count(evicted.pool()) - 1,
            "drain timed out, closing pool with handles still in use"
        );
    }

    let close_error = match factory.close(evicted.pool()).await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(tenant_id = %evicted.tenant_id(), error = %e, "failed to close pool");
            Some(e.to_string())
        }
    };
    evicted.mark_closed();

    let event = PoolEvicted {
        tenant_id: evicted.tenant_id().to_string(),
        schema_name: evicted.schema_name().to_string(),
        reason: evicted.reason(),
        close_error,
    };
    tracing::info!(
        tenant_id = %event.tenant_id,
        schema_name = %event.schema_name,
        reason = %event.reason,
        "tenant pool evicted"
    );
    hooks.pool_evicted(&event);
    event
}

/// Close a pool that never made it into the registry
pub(crate) async fn close_orphan<F: PoolFactory>(factory: Arc<F>, tenant_id: String, pool: Arc<F::Pool>) {
    if let Err(e) = factory.close(&pool).await {
        tracing::warn!(tenant_id = %tenant_id, error = %e, "failed to close orphaned pool");
    }
}
