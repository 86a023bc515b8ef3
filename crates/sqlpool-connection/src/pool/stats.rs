//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a connection pool's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of connections currently in the pool (idle + active)
    total: usize,
    /// Number of free connections
    idle: usize,
    /// Number of claimed connections
    active: usize,
    /// Raw connections opened over the pool's lifetime, including growth
    opened: u64,
    /// Connections removed by reclamation sweeps
    evicted: u64,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(total: usize, idle: usize, active: usize) -> Self {
        Self {
            total,
            idle,
            active,
            opened: 0,
            evicted: 0,
        }
    }

    /// Attach lifetime counters
    pub fn with_counters(mut self, opened: u64, evicted: u64) -> Self {
        self.opened = opened;
        self.evicted = evicted;
        self
    }

    /// Get the total number of connections
    pub fn total(&self) -> usize {
        self.total
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of active (claimed) connections
    pub fn active(&self) -> usize {
        self.active
    }

    /// Get the number of raw connections ever opened
    pub fn opened(&self) -> u64 {
        self.opened
    }

    /// Get the number of connections evicted by reclamation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Calculate pool utilization as a fraction (0.0 to 1.0)
    ///
    /// Returns 0.0 if total is 0.
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.active as f64 / self.total as f64
        }
    }

    /// Check if every connection is claimed; the next acquire will grow the pool
    pub fn is_full(&self) -> bool {
        self.idle == 0 && self.total > 0
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}
