//! Error taxonomy for the harness substrate.
//!
//! Setup-phase errors (enumeration, selection, resource creation,
//! compilation) are fatal and propagate to the binary, which exits
//! non-zero. [`ProfilingError`] is local: a failed timestamp query degrades
//! that one measurement to "unavailable" without aborting the run.

use opencl3::types::cl_int;

/// Enumeration of platforms and their GPU devices failed outright.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnumerationError {
    /// The ICD loader reported zero OpenCL platforms.
    #[error("no OpenCL platforms found")]
    NoPlatforms,
    /// Platforms exist, but none of them exposes a GPU-class device.
    #[error("OpenCL platforms found, but none exposes a GPU device")]
    NoGpuDevices,
}

/// The selector could not produce a usable (platform, device) pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no candidate platform exposes a GPU device")]
    NoUsableDevice,
}

/// Creation of an OpenCL resource failed; carries the raw status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("context creation failed with status {status}")]
    Context { status: cl_int },
    #[error("command-queue creation via the {entry_point} entry point failed with status {status}")]
    Queue { entry_point: &'static str, status: cl_int },
    #[error("buffer creation ({what}) failed with status {status}")]
    Buffer { what: &'static str, status: cl_int },
    #[error("kernel object '{name}' creation failed with status {status}")]
    Kernel { name: String, status: cl_int },
}

/// Kernel source failed to build; the driver's diagnostic log is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("kernel compilation failed; build log follows:\n{build_log}")]
pub struct CompilationError {
    pub build_log: String,
}

/// One of the four profiling-event lifecycle timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TimestampStage {
    Queued,
    Submitted,
    Started,
    Ended,
}

impl std::fmt::Display for TimestampStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Submitted => write!(f, "submitted"),
            Self::Started => write!(f, "started"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Timestamp extraction from a completion event failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfilingError {
    /// The named timestamp query returned a non-success status, typically
    /// because the owning queue was created without the profiling flag.
    #[error("the {stage} timestamp is unavailable (status {status}); \
             was the queue created with profiling enabled?")]
    TimestampUnavailable { stage: TimestampStage, status: cl_int },
    /// The timestamps are not monotonically ordered. This indicates a
    /// caller bug (event reused across submissions, or a clock
    /// inconsistency) and must never be clamped away.
    #[error("non-monotonic timestamps: {earlier} ({earlier_ns} ns) is after {later} ({later_ns} ns)")]
    NonMonotonic {
        earlier: TimestampStage,
        earlier_ns: u64,
        later: TimestampStage,
        later_ns: u64,
    },
}

/// Umbrella over every fatal setup-phase error.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
