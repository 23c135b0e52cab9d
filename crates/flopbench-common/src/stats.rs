//! Timing statistics and throughput math.
//!
//! [`TimingStats`] collects wall-clock samples across timed runs and reports
//! min/avg/max; the free functions derive GFLOPS and GB/s figures from
//! operation counts and elapsed time.

use serde::Serialize;
use std::time::Duration;

/// Wall-clock samples for the timed runs of one scenario.
///
/// Samples are stored in milliseconds; only completed runs are ever
/// recorded, so every sample participates in the average.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingStats {
    samples_ms: Vec<f64>,
}

impl TimingStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed run.
    pub fn record(&mut self, elapsed: Duration) {
        self.samples_ms.push(elapsed.as_secs_f64() * 1e3);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples_ms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples_ms.is_empty()
    }

    /// Fastest run in milliseconds, or `None` before any run completed.
    #[must_use]
    pub fn min_ms(&self) -> Option<f64> {
        self.samples_ms.iter().copied().reduce(f64::min)
    }

    /// Slowest run in milliseconds.
    #[must_use]
    pub fn max_ms(&self) -> Option<f64> {
        self.samples_ms.iter().copied().reduce(f64::max)
    }

    /// Mean run time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_ms(&self) -> Option<f64> {
        if self.samples_ms.is_empty() {
            return None;
        }
        Some(self.samples_ms.iter().sum::<f64>() / self.samples_ms.len() as f64)
    }

    /// Mean run time as a [`Duration`].
    #[must_use]
    pub fn avg(&self) -> Option<Duration> {
        self.avg_ms().map(|ms| Duration::from_secs_f64(ms / 1e3))
    }

    /// Per-sample view in milliseconds, in run order.
    #[must_use]
    pub fn samples_ms(&self) -> &[f64] {
        &self.samples_ms
    }
}

/// Floating-point operations in an n×n×n matrix multiplication:
/// n³ multiplications plus n³ additions.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn matmul_flops(n: usize) -> f64 {
    2.0 * (n as f64).powi(3)
}

/// Bytes moved by an n×n matrix multiplication: three f32 matrices.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn matmul_traffic_bytes(n: usize) -> f64 {
    3.0 * (n as f64) * (n as f64) * std::mem::size_of::<f32>() as f64
}

/// Floating-point operations in the FMA stress pass: each of `iterations`
/// loop trips performs four fused multiply-adds per element, and each FMA
/// counts as two FLOPs.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fma_flops(elements: usize, iterations: u32) -> f64 {
    elements as f64 * f64::from(iterations) * 4.0 * 2.0
}

/// GFLOPS for `total_flops` operations completed in `elapsed` wall time.
///
/// Returns 0.0 for a zero-length interval rather than infinity; a
/// zero-duration run is a measurement artifact, not infinite throughput.
#[must_use]
pub fn gflops(total_flops: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    total_flops / secs / 1e9
}

/// Memory bandwidth in GB/s for `bytes` moved in `elapsed` wall time.
#[must_use]
pub fn gigabytes_per_second(bytes: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    bytes / secs / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_have_no_figures() {
        let stats = TimingStats::new();
        assert!(stats.is_empty());
        assert_eq!(stats.min_ms(), None);
        assert_eq!(stats.avg_ms(), None);
        assert_eq!(stats.max_ms(), None);
    }

    #[test]
    fn min_avg_max_across_runs() {
        let mut stats = TimingStats::new();
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(20));
        stats.record(Duration::from_millis(30));
        assert_eq!(stats.len(), 3);
        assert!((stats.min_ms().unwrap() - 10.0).abs() < 1e-9);
        assert!((stats.avg_ms().unwrap() - 20.0).abs() < 1e-9);
        assert!((stats.max_ms().unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn gflops_formula_for_one_second_512_matmul() {
        // 2 * 512^3 FLOPs in exactly one second.
        let flops = matmul_flops(512);
        let g = gflops(flops, Duration::from_secs(1));
        let expected = 2.0 * 512f64.powi(3) / 1e9;
        assert!((g - expected).abs() < 1e-12, "got {g}, expected {expected}");
    }

    #[test]
    fn matmul_traffic_counts_three_matrices() {
        // 3 * 512^2 * 4 bytes.
        let bytes = matmul_traffic_bytes(512);
        assert!((bytes - 3.0 * 512.0 * 512.0 * 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fma_flops_counts_four_fmas_per_iteration() {
        // 8 elements, 10 iterations, 4 FMA ops of 2 FLOPs each.
        assert!((fma_flops(8, 10) - 8.0 * 10.0 * 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_elapsed_yields_zero_not_infinity() {
        assert_eq!(gflops(1e9, Duration::ZERO), 0.0);
        assert_eq!(gigabytes_per_second(1e9, Duration::ZERO), 0.0);
    }
}
