//! Configuration for the session store.

use std::time::Duration;

/// Default interval for the background sweep task.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// TTL applied to cells created without an explicit one.
    /// `None` means such cells never expire.
    pub default_ttl: Option<Duration>,

    /// Interval for the background sweep task (if spawned).
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL applied to cells that don't specify one at creation.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the interval for the background sweep task.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
