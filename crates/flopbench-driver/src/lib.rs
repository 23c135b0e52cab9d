//! Benchmark driver: one scenario state machine, two execution backends.
//!
//! The host-thread and accelerator-queue paths implement the same
//! [`ExecutionBackend`] capability, so every scenario (FMA warmup, timed
//! matrix multiplies, the kernel chain) is written once and runs on
//! either, or on a fake backend in tests.

pub mod backend;
pub mod gpu;
pub mod host;
pub mod report;
pub mod scenario;

pub use backend::{BackendError, ExecutionBackend, RunSample};
pub use gpu::{GpuBackend, GpuOptions};
pub use host::HostBackend;
pub use report::{header, section, ReportDocument};
pub use scenario::{
    deterministic_matrix, run_chain_scenario, run_fma_warmup, run_matrix_scenario, ChainOutcome,
    ScenarioOutcome, Verdict, DEFAULT_MATRIX_PLAN,
};
