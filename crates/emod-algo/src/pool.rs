//! Worker-pool sizing shared by the parallel phases.

use emod_core::{EmodError, EmodResult};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Resolve a requested worker count: 0 means one worker per CPU.
pub fn resolve_workers(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

/// Build a pool for `workers` workers. The calling thread coordinates, so the
/// pool gets `workers - 1` threads (at least one).
pub fn build_pool(workers: usize) -> EmodResult<ThreadPool> {
    let threads = workers.saturating_sub(1).max(1);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|idx| format!("emod-worker-{}", idx))
        .build()
        .map_err(|err| EmodError::Other(format!("building worker pool: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_all_cpus() {
        assert_eq!(resolve_workers(0), num_cpus::get());
        assert_eq!(resolve_workers(3), 3);
    }

    #[test]
    fn pool_reserves_the_coordinator() {
        assert_eq!(build_pool(4).unwrap().current_num_threads(), 3);
        assert_eq!(build_pool(2).unwrap().current_num_threads(), 1);
    }
}
