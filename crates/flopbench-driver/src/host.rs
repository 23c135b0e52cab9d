//! Host-thread execution backend.
//!
//! Each timed phase spawns a fresh set of worker threads over contiguous
//! partitions (rows for the matrix product, index ranges for the FMA
//! pass) and joins them all before returning. Workers write disjoint
//! output regions, so the join is the only synchronization point.

use crate::backend::{BackendError, ExecutionBackend, RunSample};
use flopbench_kernels::cpu;
use std::ops::Range;
use std::time::Instant;
use tracing::debug;

/// CPU backend over `std::thread` fan-out.
#[derive(Debug)]
pub struct HostBackend {
    workers: usize,
    display_name: String,
    n: usize,
    a: Vec<f32>,
    b: Vec<f32>,
    c: Vec<f32>,
}

impl HostBackend {
    /// Backend using one worker per logical core.
    #[must_use]
    pub fn new() -> Self {
        let workers =
            std::thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(1);
        Self::with_workers(workers)
    }

    /// Backend with an explicit worker count (minimum 1).
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            display_name: format!("host CPU ({workers} threads)"),
            n: 0,
            a: Vec::new(),
            b: Vec::new(),
            c: Vec::new(),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Contiguous partitions of `0..len` for up to `workers` workers; the last
/// partition absorbs the remainder.
fn partitions(len: usize, workers: usize) -> Vec<Range<usize>> {
    let effective = workers.min(len).max(1);
    if len == 0 {
        return Vec::new();
    }
    let chunk = len / effective;
    (0..effective)
        .map(|t| {
            let start = t * chunk;
            let end = if t == effective - 1 { len } else { (t + 1) * chunk };
            start..end
        })
        .collect()
}

impl ExecutionBackend for HostBackend {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn prepare_matmul(&mut self, a: &[f32], b: &[f32], n: usize) -> Result<(), BackendError> {
        assert_eq!(a.len(), n * n);
        assert_eq!(b.len(), n * n);
        self.n = n;
        self.a = a.to_vec();
        self.b = b.to_vec();
        self.c = vec![0.0f32; n * n];
        Ok(())
    }

    fn run_matmul(&mut self) -> Result<RunSample, BackendError> {
        if self.n == 0 {
            return Err(BackendError::NotPrepared);
        }
        let n = self.n;
        let (a, b) = (&self.a, &self.b);
        let row_ranges = partitions(n, self.workers);
        debug!("matmul fan-out across {} threads", row_ranges.len());

        let start = Instant::now();
        std::thread::scope(|scope| {
            let mut rest = self.c.as_mut_slice();
            for range in &row_ranges {
                let rows = range.len();
                let (block, tail) = std::mem::take(&mut rest).split_at_mut(rows * n);
                rest = tail;
                let first_row = range.start;
                scope.spawn(move || cpu::matmul_row_block(a, b, block, n, first_row));
            }
        });
        let wall = start.elapsed();

        Ok(RunSample { wall, profile: None })
    }

    fn read_matmul_output(&mut self, out: &mut [f32]) -> Result<(), BackendError> {
        if self.n == 0 {
            return Err(BackendError::NotPrepared);
        }
        out.copy_from_slice(&self.c);
        Ok(())
    }

    fn run_fma_stress(
        &mut self,
        elements: usize,
        iterations: u32,
    ) -> Result<RunSample, BackendError> {
        let a = vec![1.0f32; elements];
        let b = vec![2.0f32; elements];
        let mut c = vec![0.0f32; elements];
        let ranges = partitions(elements, self.workers);
        debug!("FMA stress fan-out across {} threads", ranges.len());

        let start = Instant::now();
        std::thread::scope(|scope| {
            let mut rest = c.as_mut_slice();
            for range in &ranges {
                let (block, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;
                let (a_part, b_part) = (&a[range.clone()], &b[range.clone()]);
                scope.spawn(move || cpu::fma_stress_block(a_part, b_part, block, iterations));
            }
        });
        let wall = start.elapsed();

        Ok(RunSample { wall, profile: None })
    }

    fn wait_idle(&mut self) -> Result<(), BackendError> {
        // Every phase joins its workers before returning; nothing is ever
        // still in flight here.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flopbench_kernels::cpu::reference_element;

    #[test]
    fn partitions_cover_range_without_overlap() {
        let parts = partitions(13, 4);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], 0..3);
        assert_eq!(parts[3], 9..13); // remainder lands in the last partition
        let covered: usize = parts.iter().map(std::ops::Range::len).sum();
        assert_eq!(covered, 13);
    }

    #[test]
    fn more_workers_than_rows_caps_the_fan_out() {
        let parts = partitions(3, 16);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn matmul_matches_reference_elements() {
        let n = 16;
        let a: Vec<f32> = (0..n * n).map(|i| (i % 9) as f32 * 0.5).collect();
        let b: Vec<f32> = (0..n * n).map(|i| (i % 7) as f32 * 0.25).collect();

        let mut backend = HostBackend::with_workers(3);
        backend.prepare_matmul(&a, &b, n).unwrap();
        backend.run_matmul().unwrap();

        let mut out = vec![0.0f32; n * n];
        backend.read_matmul_output(&mut out).unwrap();

        for &(row, col) in &[(0, 0), (7, 3), (15, 15)] {
            let expected = reference_element(&a, &b, n, row, col);
            assert!((out[row * n + col] - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn matmul_before_prepare_is_an_error() {
        let mut backend = HostBackend::with_workers(2);
        assert!(matches!(backend.run_matmul(), Err(BackendError::NotPrepared)));
    }

    #[test]
    fn fma_stress_runs_with_odd_partition_sizes() {
        let mut backend = HostBackend::with_workers(3);
        let sample = backend.run_fma_stress(1001, 4).unwrap();
        assert!(sample.profile.is_none());
    }
}
