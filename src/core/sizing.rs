//! Worker-pool sizing for the external processing engine.
//!
//! The orchestrator never runs engine workers itself; it only decides how many
//! the engine may start and how much RAM and how many threads each one gets.
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::debug;

use crate::error::{Error, Result};

/// Share of host RAM handed to the engine by default.
pub const DEFAULT_RAM_SCALE_FACTOR: f64 = 0.95;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Host resources the sizing heuristic works from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResources {
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub total_ram_bytes: u64,
}

impl HostResources {
    /// Query the running host.
    pub fn detect() -> Self {
        let sys = System::new_all();
        let logical_cores = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };
        let physical_cores = System::physical_core_count()
            .filter(|&n| n > 0)
            .unwrap_or(logical_cores);
        let host = HostResources {
            physical_cores,
            logical_cores,
            total_ram_bytes: sys.total_memory(),
        };
        debug!("Detected host resources: {:?}", host);
        host
    }
}

/// Allocation handed to the engine's worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSizing {
    pub ram_per_worker_mb: u64,
    pub worker_count: usize,
    pub threads_per_worker: usize,
}

/// Size the engine pool for `n_products` inputs.
///
/// `worker_count = min(2 * n_products, physical_cores)`, RAM and logical
/// threads are split evenly across workers (floored). Values are not clamped
/// further: the host report is trusted.
pub fn size_cluster(
    n_products: usize,
    host: &HostResources,
    ram_scale_factor: f64,
) -> Result<ClusterSizing> {
    if n_products < 1 {
        return Err(Error::InvalidProductCount { count: n_products });
    }
    let worker_count = n_products
        .saturating_mul(2)
        .min(host.physical_cores)
        .max(1);
    let ram_per_worker_bytes =
        (ram_scale_factor * host.total_ram_bytes as f64 / worker_count as f64).floor() as u64;
    let sizing = ClusterSizing {
        ram_per_worker_mb: ram_per_worker_bytes / BYTES_PER_MB,
        worker_count,
        threads_per_worker: host.logical_cores / worker_count,
    };
    debug!(
        "Cluster sizing for {} product(s): {:?}",
        n_products, sizing
    );
    Ok(sizing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn host(physical: usize, logical: usize, ram_gib: u64) -> HostResources {
        HostResources {
            physical_cores: physical,
            logical_cores: logical,
            total_ram_bytes: ram_gib * GIB,
        }
    }

    #[test]
    fn splits_resources_across_workers() {
        let sizing = size_cluster(2, &host(8, 16, 64), DEFAULT_RAM_SCALE_FACTOR).unwrap();
        assert_eq!(sizing.worker_count, 4);
        assert_eq!(sizing.threads_per_worker, 4);
        // 0.95 * 65536 MB / 4
        assert_eq!(sizing.ram_per_worker_mb, 15564);
    }

    #[test]
    fn worker_count_is_capped_by_physical_cores() {
        let sizing = size_cluster(10, &host(6, 12, 32), DEFAULT_RAM_SCALE_FACTOR).unwrap();
        assert_eq!(sizing.worker_count, 6);
        assert_eq!(sizing.threads_per_worker, 2);
    }

    #[test]
    fn worker_count_is_monotonic_up_to_the_cap() {
        let h = host(7, 14, 16);
        let mut previous = 0;
        for n in 1..20 {
            let sizing = size_cluster(n, &h, DEFAULT_RAM_SCALE_FACTOR).unwrap();
            assert!(sizing.worker_count >= previous);
            assert!(sizing.worker_count <= h.physical_cores);
            previous = sizing.worker_count;
        }
        assert_eq!(previous, 7);
    }

    #[test]
    fn ram_never_exceeds_the_scaled_total() {
        for (n, h, scale) in [
            (1, host(4, 8, 15), 0.95),
            (3, host(32, 64, 251), 0.8),
            (5, host(3, 3, 7), 1.0),
        ] {
            let sizing = size_cluster(n, &h, scale).unwrap();
            let used = sizing.ram_per_worker_mb * BYTES_PER_MB * sizing.worker_count as u64;
            assert!(used as f64 <= scale * h.total_ram_bytes as f64);
        }
    }

    #[test]
    fn zero_products_is_rejected() {
        let err = size_cluster(0, &host(8, 16, 64), DEFAULT_RAM_SCALE_FACTOR).unwrap_err();
        assert!(matches!(err, Error::InvalidProductCount { count: 0 }));
    }
}
