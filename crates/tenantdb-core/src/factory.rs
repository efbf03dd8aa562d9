//! Collaborator trait for creating and closing tenant pools

use std::sync::Arc;

use async_trait::async_trait;

use crate::ConnectError;

/// creates, checks and closes the per-tenant pools the manager caches.
///
/// The manager treats `Pool` as an opaque handle. Implementations wrap a
/// driver-level pool (deadpool, bb8, a driver's own pool type, ...) scoped to
/// one schema or database.
#[async_trait]
pub trait PoolFactory: Send + Sync + 'static {
    /// The pool handle handed to callers as `Arc<Pool>`
    type Pool: Send + Sync + 'static;

    /// Create a pool bound to `schema_name`
    async fn create(&self, schema_name: &str) -> Result<Self::Pool, ConnectError>;

    /// Check that a cached pool is still usable
    ///
    /// Default implementation always returns true.
    async fn is_healthy(&self, _pool: &Self::Pool) -> bool {
        true
    }

    /// Release the pool's connections
    async fn close(&self, pool: &Self::Pool) -> Result<(), ConnectError>;
}

#[async_trait]
impl<T: PoolFactory> PoolFactory for Arc<T> {
    type Pool = T::Pool;

    async fn create(&self, schema_name: &str) -> Result<Self::Pool, ConnectError> {
        (**self).create(schema_name).await
    }

    async fn is_healthy(&self, pool: &Self::Pool) -> bool {
        (**self).is_healthy(pool).await
    }

    async fn close(&self, pool: &Self::Pool) -> Result<(), ConnectError> {
        (**self).close(pool).await
    }
}
