//! Benchmark scenarios.
//!
//! Each scenario walks the same phases on whatever backend it is handed:
//! Init (allocate and upload), Warmup (one untimed execution), TimedRuns
//! (k wall-clock-timed executions), Verify (single-threaded reference
//! element against an absolute tolerance), Report (derived GFLOPS and
//! bandwidth figures). A correctness mismatch marks the scenario failed
//! but never discards its timing.

use crate::backend::{BackendError, ExecutionBackend};
use flopbench_common::stats::{
    fma_flops, gflops, gigabytes_per_second, matmul_flops, matmul_traffic_bytes, TimingStats,
};
use flopbench_kernels::cpu;
use flopbench_opencl::ProfileBreakdown;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The matrix sizes and timed-run counts of a full sweep.
pub const DEFAULT_MATRIX_PLAN: &[(usize, usize)] = &[(512, 5), (1024, 5), (2048, 3)];

/// Elements in the FMA stress pass (4 Mi).
pub const FMA_STRESS_ELEMENTS: usize = 4 * 1024 * 1024;
/// Loop trips per element in the FMA stress pass.
pub const FMA_STRESS_ITERATIONS: u32 = 1000;

/// Matrix size used by the kernel-chain scenario.
pub const CHAIN_MATRIX_SIZE: usize = 512;
/// Kernels run back-to-back by the chain scenario.
pub const CHAIN_LINKS: usize = 4;

/// Absolute tolerance of the correctness spot-check.
pub const VERIFY_TOLERANCE: f32 = 0.01;

/// Outcome of the correctness spot-check on `C[0][0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Verdict {
    Passed { value: f32 },
    Mismatch { measured: f32, expected: f32 },
}

impl Verdict {
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

/// Everything one scenario produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub stats: TimingStats,
    pub gflops: f64,
    /// GB/s over the three matrices; absent for the FMA pass.
    pub bandwidth_gbps: Option<f64>,
    /// Absent when the scenario has no spot-check (FMA stress).
    pub verdict: Option<Verdict>,
    /// Device-side breakdown of the last timed run, when profiling ran.
    pub last_profile: Option<ProfileBreakdown>,
    /// Set on correctness mismatch; timing above is still valid.
    pub failed: bool,
}

/// Outcome of the kernel-chain scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome {
    pub name: String,
    /// Per-link times, submission to completion.
    pub per_link_ms: Vec<f64>,
    /// Sum of the per-link times.
    pub summed_ms: f64,
    /// Wall time around the whole chain; the gap to `summed_ms` is
    /// submission/dispatch overhead.
    pub wall_ms: f64,
    pub gflops: f64,
}

/// Deterministic pseudo-random matrix in `[0, 1)`, seeded per matrix so
/// repeated runs verify against identical inputs.
#[must_use]
pub fn deterministic_matrix(n: usize, mut seed: u32) -> Vec<f32> {
    (0..n * n)
        .map(|_| {
            // xorshift32
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            (seed >> 8) as f32 / (1u32 << 24) as f32
        })
        .collect()
}

/// FMA stress pass: one untimed-warmup-free measured sweep, used to pull
/// the device (or the CPU governor) up to its high-performance state
/// before the matrix scenarios run.
pub fn run_fma_warmup(
    backend: &mut dyn ExecutionBackend,
) -> Result<ScenarioOutcome, BackendError> {
    info!(
        "FMA stress: {} iterations over {} elements",
        FMA_STRESS_ITERATIONS, FMA_STRESS_ELEMENTS
    );
    let sample = backend.run_fma_stress(FMA_STRESS_ELEMENTS, FMA_STRESS_ITERATIONS)?;

    let mut run_stats = TimingStats::new();
    run_stats.record(sample.wall);
    let flops = fma_flops(FMA_STRESS_ELEMENTS, FMA_STRESS_ITERATIONS);

    Ok(ScenarioOutcome {
        name: "FMA stress (warmup)".to_owned(),
        gflops: gflops(flops, sample.wall),
        bandwidth_gbps: None,
        stats: run_stats,
        verdict: None,
        last_profile: sample.profile,
        failed: false,
    })
}

/// One full matrix-multiply scenario at size `n` with `runs` timed runs.
pub fn run_matrix_scenario(
    backend: &mut dyn ExecutionBackend,
    n: usize,
    runs: usize,
) -> Result<ScenarioOutcome, BackendError> {
    info!(
        "matrix multiply {n}×{n} ({:.1} MB per matrix), {runs} timed runs",
        matmul_traffic_bytes(n) / 3.0 / (1024.0 * 1024.0)
    );

    // Init
    let a = deterministic_matrix(n, 0x2545_f491);
    let b = deterministic_matrix(n, 0x9e37_79b9);
    backend.prepare_matmul(&a, &b, n)?;

    // Warmup: one untimed execution absorbs compilation caches and
    // frequency ramp.
    backend.run_matmul()?;

    // TimedRuns
    let mut run_stats = TimingStats::new();
    let mut last_profile = None;
    for run in 0..runs {
        let sample = backend.run_matmul()?;
        debug!("run {run}: {:.3} ms", sample.wall.as_secs_f64() * 1e3);
        run_stats.record(sample.wall);
        if sample.profile.is_some() {
            last_profile = sample.profile;
        }
    }

    // Verify
    let mut out = vec![0.0f32; n * n];
    backend.read_matmul_output(&mut out)?;
    let expected = cpu::reference_element(&a, &b, n, 0, 0);
    let measured = out[0];
    let verdict = if (measured - expected).abs() <= VERIFY_TOLERANCE {
        Verdict::Passed { value: measured }
    } else {
        warn!("correctness mismatch: C[0][0] = {measured}, expected {expected}");
        Verdict::Mismatch { measured, expected }
    };

    // Report figures
    let avg = run_stats.avg();
    let flops = matmul_flops(n);
    let traffic = matmul_traffic_bytes(n);
    Ok(ScenarioOutcome {
        name: format!("matrix multiply {n}×{n}"),
        gflops: avg.map_or(0.0, |d| gflops(flops, d)),
        bandwidth_gbps: avg.map(|d| gigabytes_per_second(traffic, d)),
        stats: run_stats,
        failed: !verdict.passed(),
        verdict: Some(verdict),
        last_profile,
    })
}

/// Chain scenario: [`CHAIN_LINKS`] back-to-back matrix multiplies on one
/// queue (or thread pool), comparing summed per-link time against the
/// wall time of the whole chain.
pub fn run_chain_scenario(
    backend: &mut dyn ExecutionBackend,
) -> Result<ChainOutcome, BackendError> {
    let n = CHAIN_MATRIX_SIZE;
    info!("kernel chain: {CHAIN_LINKS} × matrix multiply {n}×{n}");

    let a = deterministic_matrix(n, 0x0bad_5eed);
    let b = deterministic_matrix(n, 0x1234_5678);
    backend.prepare_matmul(&a, &b, n)?;

    let wall_start = Instant::now();
    let mut per_link_ms = Vec::with_capacity(CHAIN_LINKS);
    for link in 0..CHAIN_LINKS {
        let sample = backend.run_matmul()?;
        let ms = sample.wall.as_secs_f64() * 1e3;
        debug!("link {link}: {ms:.2} ms");
        per_link_ms.push(ms);
    }
    backend.wait_idle()?;
    let wall_ms = wall_start.elapsed().as_secs_f64() * 1e3;

    let summed_ms: f64 = per_link_ms.iter().sum();
    let total_flops = matmul_flops(n) * CHAIN_LINKS as f64;
    let gflops = if summed_ms > 0.0 { total_flops / (summed_ms / 1e3) / 1e9 } else { 0.0 };

    Ok(ChainOutcome {
        name: format!("kernel chain ({CHAIN_LINKS} × {n}×{n})"),
        per_link_ms,
        summed_ms,
        wall_ms,
        gflops,
    })
}
