//! Pool probing with a bounded timeout

use std::time::Duration;

use tenantdb_core::PoolFactory;
use tokio::time::Instant;

use super::status::HealthStatus;

/// Configuration for health checking
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Timeout for each health check
    pub check_timeout: Duration,
    /// Evict pools that fail the health check
    pub evict_unhealthy: bool,
}

impl HealthCheckConfig {
    pub fn new(check_timeout: Duration) -> Self {
        Self {
            check_timeout,
            evict_unhealthy: true,
        }
    }

    /// Set whether failing pools are evicted.
    pub fn with_evict_unhealthy(mut self, evict: bool) -> Self {
        self.evict_unhealthy = evict;
        self
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Check a pool through its factory.
///
/// Returns the status and, when the check finished, how long it took.
pub async fn check_pool<F: PoolFactory>(
    factory: &F,
    pool: &F::Pool,
    timeout: Duration,
) -> (HealthStatus, Option<Duration>) {
    let start = Instant::now();
    match tokio::time::timeout(timeout, factory.is_healthy(pool)).await {
        Ok(true) => (HealthStatus::Healthy, Some(start.elapsed())),
        Ok(false) => (HealthStatus::Unhealthy, Some(start.elapsed())),
        Err(_) => (HealthStatus::TimedOut, None),
    }
}
