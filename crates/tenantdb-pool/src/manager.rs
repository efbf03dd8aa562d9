//! Tenant pool manager
//!
//! [`TenantPoolManager`] ties the registry, the retry executor and the
//! single-flight coordinator together. It hands out shared pool handles,
//! evicts idle or least recently used pools and closes everything on
//! `dispose()`.

mod builder;
mod coordinator;
mod lifecycle;
mod manager;
mod stats;
mod warmup;


pub use builder::TenantPoolManagerBuilder;
pub use lifecycle::{PoolCreated, PoolCreatedHook, PoolEvicted, PoolEvictedHook};
pub use manager::TenantPoolManager;
pub use stats::ManagerStats;
pub use warmup::{TenantWarmup, WarmupOutcome, WarmupReport};
