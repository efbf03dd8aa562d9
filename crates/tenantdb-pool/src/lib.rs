//! TenantDB Pool - Tenant-scoped connection pool management
//!
//! This crate keeps one database pool per tenant and bounds how many exist
//! at once:
//!
//! - `retry` - Capped exponential backoff and the transient-error classifier
//! - `registry` - LRU and idle-TTL bookkeeping of ready pools
//! - `manager` - `TenantPoolManager`, the façade hosts call into
//! - `health` - Probing cached pools through the factory
//! - `config` - TOML-loadable settings
//!
//! # Example
//!
//! ```ignore
//! use tenantdb_pool::{PoolSettings, TenantPoolManager};
//!
//! let manager = TenantPoolManager::builder(factory)
//!     .settings(PoolSettings::default().with_max_pools(100))
//!     .build()?;
//! manager.start_sweeper();
//!
//! let pool = manager.acquire("acme").await?;
//! // run queries against `pool`
//!
//! manager.dispose().await;
//! ```

pub mod config;
pub mod health;
pub mod manager;
pub mod registry;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PoolSettings, RetrySettings, SchemaNameTemplate};
pub use health::{HealthCheckConfig, HealthReport, HealthStatus};
pub use manager::{
    ManagerStats, PoolCreated, PoolEvicted, TenantPoolManager, TenantPoolManagerBuilder,
    WarmupOutcome, WarmupReport,
};
pub use registry::{EntryState, EvictionReason};
pub use retry::{BackoffStrategy, RetryClassifier, RetryConfig, with_retry};
pub use tenantdb_core::{ConnectError, ErrorCategory, PoolFactory, PoolManagerError, Result};
