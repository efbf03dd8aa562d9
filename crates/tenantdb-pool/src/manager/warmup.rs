//! Pre-provisioning results

use std::time::Duration;

use tenantdb_core::PoolManagerError;

/// Result of warming a single tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupOutcome {
    /// The pool was already cached before the call
    pub already_warm: bool,
}

/// Per-tenant result of [`warmup_many`](super::TenantPoolManager::warmup_many)
#[derive(Debug, Clone)]
pub struct TenantWarmup {
    pub tenant_id: String,
    pub result: Result<WarmupOutcome, PoolManagerError>,
    pub duration: Duration,
}

/// Summary of warming several tenants
#[derive(Debug, Clone, Default)]
pub struct WarmupReport {
    pub tenants: Vec<TenantWarmup>,
}

impl WarmupReport {
    /// Tenants whose pool is now cached
    pub fn succeeded(&self) -> usize {
        self.tenants.iter().filter(|t| t.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.tenants.len() - self.succeeded()
    }

    /// Tenants that already had a cached pool
    pub fn already_warm(&self) -> usize {
        self.tenants
            .iter()
            .filter(|t| matches!(t.result, Ok(WarmupOutcome { already_warm: true })))
            .count()
    }

    pub fn errors(&self) -> Vec<(&str, &PoolManagerError)> {
        self.tenants
            .iter()
            .filter_map(|t| t.result.as_ref().err().map(|e| (t.tenant_id.as_str(), e)))
            .collect()
    }
}
