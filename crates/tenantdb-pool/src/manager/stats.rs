//! Manager statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a pool manager's state
///
/// Taken under the registry lock, so the numbers are consistent with each
/// other but may be stale by the time they are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Number of cached tenant pools
    pool_count: usize,
    /// Configured capacity
    max_pools: usize,
    /// Number of creations currently in flight
    in_flight: usize,
    disposed: bool,
}

impl ManagerStats {
    pub fn new(pool_count: usize, max_pools: usize, in_flight: usize, disposed: bool) -> Self {
        Self {
            pool_count,
            max_pools,
            in_flight,
            disposed,
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pool_count
    }

    pub fn max_pools(&self) -> usize {
        self.max_pools
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Registry fill ratio (0.0 to 1.0)
    ///
    /// Returns 0.0 if max_pools is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.max_pools == 0 {
            0.0
        } else {
            self.pool_count as f64 / self.max_pools as f64
        }
    }

    /// Whether the next new tenant will evict an existing pool
    pub fn is_full(&self) -> bool {
        self.pool_count >= self.max_pools
    }
}
