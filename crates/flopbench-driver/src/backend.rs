//! The execution-backend capability shared by the host and GPU paths.

use flopbench_opencl::{CompilationError, HarnessError, ProfileBreakdown, ResourceError};
use opencl3::types::cl_int;
use std::time::Duration;

/// One completed, timed execution of a kernel.
#[derive(Debug, Clone, Copy)]
pub struct RunSample {
    /// Wall-clock time from submission to completion, measured on the
    /// host's monotonic clock.
    pub wall: Duration,
    /// Device-side timestamp breakdown, when the backend was built with
    /// profiling enabled and the extraction succeeded.
    pub profile: Option<ProfileBreakdown>,
}

/// Errors from an execution backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Setup(#[from] HarnessError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    /// A post-setup API call failed; carries the raw status code.
    #[error("{what} failed with status {status}")]
    Call { what: &'static str, status: cl_int },
    /// A matmul operation was requested before `prepare_matmul`.
    #[error("matrix buffers not prepared")]
    NotPrepared,
}

/// A place work can be executed and timed: the host thread pool or an
/// accelerator command queue.
///
/// All calls are driven from a single thread. Submission blocks until the
/// work completes (each backend applies its own full-completion barrier
/// before returning), so a returned [`RunSample`] always describes
/// finished work.
pub trait ExecutionBackend {
    /// Human-readable backend description for the report header.
    fn name(&self) -> &str;

    /// Size buffers for an `n`×`n` matrix product and upload the inputs.
    fn prepare_matmul(&mut self, a: &[f32], b: &[f32], n: usize) -> Result<(), BackendError>;

    /// Execute one matrix multiply over the prepared buffers.
    fn run_matmul(&mut self) -> Result<RunSample, BackendError>;

    /// Read the output matrix back into `out` (length `n`×`n`).
    fn read_matmul_output(&mut self, out: &mut [f32]) -> Result<(), BackendError>;

    /// Run the FMA stress pass over `elements` elements.
    fn run_fma_stress(&mut self, elements: usize, iterations: u32)
        -> Result<RunSample, BackendError>;

    /// Block until every submitted unit of work has completed.
    fn wait_idle(&mut self) -> Result<(), BackendError>;
}
