//! OpenCL harness substrate for flopbench.
//!
//! Everything between "is there a usable GPU?" and "the kernel ran and here
//! is how long it took" lives here: platform/device enumeration, the
//! stability-ranked device selector, context and command-queue construction
//! through the legacy entry point, kernel compilation, and profiling-event
//! timestamp extraction.

pub mod enumerate;
pub mod error;
pub mod profiling;
pub mod program;
pub mod queue;
pub mod selector;

pub use enumerate::{enumerate_gpu_platforms, GpuDeviceInfo, PlatformCandidates, PlatformEntry};
pub use error::{
    CompilationError, EnumerationError, HarnessError, ProfilingError, ResourceError,
    SelectionError, TimestampStage,
};
pub use profiling::{execution_time, full_breakdown, EventTimestamps, ProfileBreakdown};
pub use program::{compile_program, create_kernel, KernelSource};
pub use queue::{
    build_context, build_queue, build_queue_with, ClQueueConstructor, PathCapabilities,
    QueueConstructor, QueueGuard, QueueOps, QueueProperties, QueueStrategy,
};
pub use selector::{select_best, RankRule, RankTable, SelectedDevice, UNMATCHED_RANK};
