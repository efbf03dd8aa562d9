//! Health checking for cached tenant pools
//!
//! # Example
//!
//! ```ignore
//! use tenantdb_pool::health::HealthCheckConfig;
//!
//! let report = manager.check_health(&HealthCheckConfig::default()).await?;
//! for tenant in report.unhealthy_tenants() {
//!     tracing::warn!(tenant_id = tenant, "pool evicted after failed health check");
//! }
//! ```

mod checker;
mod status;

#[cfg(test)]
mod tests;

pub use checker::{HealthCheckConfig, check_pool};
pub use status::{HealthReport, HealthStatus, TenantHealth};
