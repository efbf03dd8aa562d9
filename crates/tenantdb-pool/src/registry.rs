//! Tenant pool registry
//!
//! This module provides the bounded cache of ready pools, keyed by tenant,
//! with strict LRU eviction on capacity and idle-TTL expiry.

mod entry;
mod registry;


pub use entry::{EntryState, EvictedPool, EvictionReason, PoolEntry};
pub use registry::PoolRegistry;
