//! TenantDB Core - Shared abstractions for tenant-scoped connection pools
//!
//! This crate provides the types every other TenantDB crate depends on:
//!
//! - `PoolFactory` - Trait the host implements to create, check and close pools
//! - `ConnectError` / `ErrorCategory` - Classified pool creation failures
//! - `PoolManagerError` - Errors surfaced to callers of the pool manager

mod error;
mod factory;

pub use error::*;
pub use factory::*;
