//! Health status classification for cached tenant pools

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of probing one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The factory reported the pool as usable
    #[default]
    Healthy,
    /// The factory reported the pool as unusable
    Unhealthy,
    /// The check did not finish within the configured timeout
    TimedOut,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Health of one tenant's pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantHealth {
    pub tenant_id: String,
    pub status: HealthStatus,
    /// Check duration; `None` when the check timed out
    pub latency: Option<Duration>,
    /// Whether the pool was evicted because of this result
    pub evicted: bool,
}

/// Result of checking every cached pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub tenants: Vec<TenantHealth>,
}

impl HealthReport {
    pub fn healthy_count(&self) -> usize {
        self.tenants.iter().filter(|t| t.status.is_healthy()).count()
    }

    pub fn unhealthy_count(&self) -> usize {
        self.tenants.len() - self.healthy_count()
    }

    pub fn is_healthy(&self) -> bool {
        self.unhealthy_count() == 0
    }

    /// Tenants whose pool failed the health check
    pub fn unhealthy_tenants(&self) -> Vec<&str> {
        self.tenants
            .iter()
            .filter(|t| !t.status.is_healthy())
            .map(|t| t.tenant_id.as_str())
            .collect()
    }
}
