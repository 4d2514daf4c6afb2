//! Thread pool configuration for weight computation
//!
//! The native engines compute weights on Rayon's global pool; this module
//! sizes that pool.

use crate::errors::{CfRegridError, Result};
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Configuration for parallel weight computation
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Use every available CPU core
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Set up the global Rayon thread pool
    ///
    /// # Errors
    ///
    /// Fails when the pool cannot be built, for instance because it was
    /// already initialised.
    pub fn setup_global_pool(&self) -> Result<()> {
        match self.num_threads {
            Some(0) => Err(CfRegridError::configuration(
                "thread count must be at least 1",
            )),
            Some(num_threads) => {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build_global()
                    .map_err(|e| {
                        CfRegridError::ThreadPoolError(format!(
                            "Failed to initialize thread pool with {} threads: {}",
                            num_threads, e
                        ))
                    })?;
                info!(threads = num_threads, "configured weight computation pool");
                Ok(())
            }
            None => {
                info!(
                    threads = rayon::current_num_threads(),
                    "using default thread pool"
                );
                Ok(())
            }
        }
    }

    /// Threads in the current pool
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }
}
