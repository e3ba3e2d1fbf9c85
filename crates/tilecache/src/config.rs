//! Cache configuration

use crate::error::{Error, Result};

/// Default number of resident tiles
pub const DEFAULT_CAPACITY: usize = 50;

/// Default number of generation workers
pub const DEFAULT_WORKERS: usize = 4;

/// Default number of pending generation requests
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// What a miss does when the work queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaturationPolicy {
    /// Drop the request and roll back its placeholder; the next miss retries.
    /// The caller never waits.
    #[default]
    Drop,
    /// Wait until a worker frees a queue slot
    Block,
}

/// Construction-time settings for `TileCache`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of resident tiles
    pub capacity: usize,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum number of pending generation requests
    pub queue_capacity: usize,
    /// Behaviour on a full work queue
    pub saturation: SaturationPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            saturation: SaturationPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration with the given capacity and worker count
    pub fn new(capacity: usize, workers: usize) -> Self {
        Self {
            capacity,
            workers,
            ..Self::default()
        }
    }

    /// Set the work queue bound
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the saturation policy
    pub fn with_saturation(mut self, saturation: SaturationPolicy) -> Self {
        self.saturation = saturation;
        self
    }

    /// Reject settings the cache cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be greater than 0"));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be greater than 0"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be greater than 0"));
        }
        Ok(())
    }
}
