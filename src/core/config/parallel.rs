//! Parallel processing configuration.

use serde::{Deserialize, Serialize};

/// Controls how batches of images are spread across worker threads.
///
/// Images are independent, so a batch is processed with one rayon task per
/// image. Small batches run sequentially to avoid pool overhead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParallelPolicy {
    /// Maximum number of threads to use for parallel processing.
    /// If None, rayon will use the default thread pool size (typically number of CPU cores).
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Batches with at most this many images are processed sequentially.
    /// Default: 1
    #[serde(default = "ParallelPolicy::default_batch_threshold")]
    pub batch_threshold: usize,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the sequential batch threshold.
    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold;
        self
    }

    /// Returns true when a batch of `len` images should be processed in parallel.
    pub fn should_parallelize(&self, len: usize) -> bool {
        len > self.batch_threshold
    }

    /// Install the global rayon thread pool with the configured number of threads.
    ///
    /// This method should be called once at application startup before any parallel
    /// processing occurs. If `max_threads` is None, this method does nothing and
    /// rayon will use its default thread pool size.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the thread pool was successfully configured
    /// - `Ok(false)` if `max_threads` is None (no configuration needed)
    /// - `Err` if the thread pool has already been initialized
    pub fn install_global_thread_pool(&self) -> Result<bool, rayon::ThreadPoolBuildError> {
        if let Some(num_threads) = self.max_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn default_batch_threshold() -> usize {
        1
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            batch_threshold: Self::default_batch_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parallelize() {
        let policy = ParallelPolicy::new().with_batch_threshold(2);
        assert!(!policy.should_parallelize(1));
        assert!(!policy.should_parallelize(2));
        assert!(policy.should_parallelize(3));
    }

    #[test]
    fn test_builder_keeps_threshold() {
        let policy = ParallelPolicy::new()
            .with_batch_threshold(5)
            .with_max_threads(Some(3));
        assert_eq!(policy.max_threads, Some(3));
        assert!(!policy.should_parallelize(5));
        assert!(policy.should_parallelize(6));
    }

    #[test]
    fn test_no_threads_means_no_pool() {
        let policy = ParallelPolicy::default();
        assert!(!policy.install_global_thread_pool().unwrap());
    }
}
