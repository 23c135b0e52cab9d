//! OpenCL execution backend.
//!
//! One context, one command queue, one submitting thread. Transfers are
//! blocking; every timed run ends with a full-queue barrier before the
//! wall clock is read. Teardown order is fixed by field declaration:
//! buffers and kernels, then the guarded queue (drained before release),
//! then the context.

use crate::backend::{BackendError, ExecutionBackend, RunSample};
use flopbench_common::stats;
use flopbench_kernels::{KERNEL_FMA_STRESS, KERNEL_MATRIX_MULTIPLY};
use flopbench_opencl::{
    build_context, build_queue, compile_program, create_kernel, enumerate_gpu_platforms,
    full_breakdown, select_best, HarnessError, KernelSource, QueueGuard, QueueProperties,
    QueueStrategy, RankTable, ResourceError, SelectedDevice,
};
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{
    cl_mem_flags, Buffer, ClMem, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY,
};
use opencl3::program::Program;
use opencl3::types::{cl_uint, CL_BLOCKING};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Work-group edge for the 2D matrix kernel, matching the device source.
const MATMUL_TILE: usize = 16;
/// Work-group size for the 1D FMA kernel.
const FMA_GROUP: usize = 256;

/// Options for bringing up the GPU backend.
pub struct GpuOptions {
    pub rank_table: RankTable,
    pub strategy: QueueStrategy,
    pub properties: QueueProperties,
    pub kernel_source: KernelSource,
}

impl Default for GpuOptions {
    /// Legacy queue path with profiling enabled, default rank policy,
    /// embedded kernel source.
    fn default() -> Self {
        Self {
            rank_table: RankTable::default(),
            strategy: QueueStrategy::default(),
            properties: QueueProperties::none().with_profiling(),
            kernel_source: KernelSource::embedded(flopbench_kernels::MATRIX_KERNELS_SRC),
        }
    }
}

/// GPU backend over a selected OpenCL device.
///
/// Field order is load-bearing: buffers and kernel objects drop before the
/// queue guard, and the queue guard (which drains the queue) drops before
/// the context.
pub struct GpuBackend {
    n: usize,
    buf_a: Option<Buffer<f32>>,
    buf_b: Option<Buffer<f32>>,
    buf_c: Option<Buffer<f32>>,
    matmul_kernel: Kernel,
    fma_kernel: Kernel,
    _program: Program,
    queue: QueueGuard<CommandQueue>,
    context: Context,
    selected: SelectedDevice,
    profiling: bool,
    display_name: String,
}

impl GpuBackend {
    /// Enumerate, select, and build the full execution substrate.
    ///
    /// Any failure here is a setup failure: partially acquired resources
    /// release in reverse order as the error propagates.
    pub fn initialize(options: GpuOptions) -> Result<Self, HarnessError> {
        let candidates = enumerate_gpu_platforms()?;
        let selected = select_best(candidates, &options.rank_table)?;
        if let Some(rationale) = &selected.rationale {
            info!("platform policy: {rationale}");
        }

        let context = build_context(&selected)?;
        let queue = build_queue(&context, &selected, options.strategy, options.properties)?;
        let program = compile_program(&context, &options.kernel_source)?;
        let matmul_kernel = create_kernel(&program, KERNEL_MATRIX_MULTIPLY)?;
        let fma_kernel = create_kernel(&program, KERNEL_FMA_STRESS)?;

        let display_name = format!(
            "{} on {} ({} CUs, {} MB, {} MHz)",
            selected.device.name,
            selected.platform.name,
            selected.device.compute_units,
            selected.device.global_mem_bytes / (1024 * 1024),
            selected.device.max_clock_mhz,
        );
        info!("GPU backend ready: {display_name}");

        Ok(Self {
            n: 0,
            buf_a: None,
            buf_b: None,
            buf_c: None,
            matmul_kernel,
            fma_kernel,
            _program: program,
            queue: QueueGuard::new(queue),
            context,
            selected,
            profiling: options.properties.profiling,
            display_name,
        })
    }

    /// The chosen (platform, device) pair.
    #[must_use]
    pub fn selected(&self) -> &SelectedDevice {
        &self.selected
    }

    fn create_buffer(
        &self,
        flags: cl_mem_flags,
        len: usize,
        what: &'static str,
    ) -> Result<Buffer<f32>, BackendError> {
        let buffer = unsafe {
            Buffer::<f32>::create(&self.context, flags, len, std::ptr::null_mut())
                .map_err(|e| ResourceError::Buffer { what, status: e.0 })?
        };
        Ok(buffer)
    }

    fn write_buffer(
        &self,
        buffer: &mut Buffer<f32>,
        data: &[f32],
        what: &'static str,
    ) -> Result<(), BackendError> {
        unsafe {
            self.queue
                .get()
                .enqueue_write_buffer(buffer, CL_BLOCKING, 0, data, &[])
                .map_err(|e| BackendError::Call { what, status: e.0 })?;
        }
        Ok(())
    }

    fn extract_profile(&self, event: &opencl3::event::Event) -> Option<flopbench_opencl::ProfileBreakdown> {
        if !self.profiling {
            return None;
        }
        match full_breakdown(event) {
            Ok(breakdown) => Some(breakdown),
            Err(e) => {
                warn!("profiling unavailable for this run: {e}");
                None
            }
        }
    }
}

impl ExecutionBackend for GpuBackend {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn prepare_matmul(&mut self, a: &[f32], b: &[f32], n: usize) -> Result<(), BackendError> {
        assert_eq!(a.len(), n * n);
        assert_eq!(b.len(), n * n);
        debug!(
            "allocating matrix buffers: {} MB per matrix",
            stats::matmul_traffic_bytes(n) / 3.0 / (1024.0 * 1024.0)
        );

        let mut buf_a = self.create_buffer(CL_MEM_READ_ONLY, n * n, "matrix A")?;
        let mut buf_b = self.create_buffer(CL_MEM_READ_ONLY, n * n, "matrix B")?;
        let buf_c = self.create_buffer(CL_MEM_WRITE_ONLY, n * n, "matrix C")?;

        self.write_buffer(&mut buf_a, a, "upload matrix A")?;
        self.write_buffer(&mut buf_b, b, "upload matrix B")?;

        self.n = n;
        self.buf_a = Some(buf_a);
        self.buf_b = Some(buf_b);
        self.buf_c = Some(buf_c);
        Ok(())
    }

    fn run_matmul(&mut self) -> Result<RunSample, BackendError> {
        let n = self.n;
        let (Some(buf_a), Some(buf_b), Some(buf_c)) =
            (self.buf_a.as_ref(), self.buf_b.as_ref(), self.buf_c.as_ref())
        else {
            return Err(BackendError::NotPrepared);
        };

        let start = Instant::now();
        let event = unsafe {
            let mut exec = ExecuteKernel::new(&self.matmul_kernel);
            exec.set_arg(&buf_a.get())
                .set_arg(&buf_b.get())
                .set_arg(&buf_c.get())
                .set_arg(&(n as cl_uint))
                .set_global_work_sizes(&[n, n]);
            if n % MATMUL_TILE == 0 {
                exec.set_local_work_sizes(&[MATMUL_TILE, MATMUL_TILE]);
            }
            exec.enqueue_nd_range(self.queue.get())
                .map_err(|e| BackendError::Call { what: "enqueue matrix multiply", status: e.0 })?
        };
        self.queue
            .barrier()
            .map_err(|status| BackendError::Call { what: "queue finish", status })?;
        let wall = start.elapsed();

        Ok(RunSample { wall, profile: self.extract_profile(&event) })
    }

    fn read_matmul_output(&mut self, out: &mut [f32]) -> Result<(), BackendError> {
        let Some(buf_c) = self.buf_c.as_ref() else {
            return Err(BackendError::NotPrepared);
        };
        unsafe {
            self.queue
                .get()
                .enqueue_read_buffer(buf_c, CL_BLOCKING, 0, out, &[])
                .map_err(|e| BackendError::Call { what: "read matrix C", status: e.0 })?;
        }
        Ok(())
    }

    fn run_fma_stress(
        &mut self,
        elements: usize,
        iterations: u32,
    ) -> Result<RunSample, BackendError> {
        let host_a = vec![1.0f32; elements];
        let host_b = vec![2.0f32; elements];
        let host_c = vec![0.0f32; elements];

        let mut buf_a = self.create_buffer(CL_MEM_READ_ONLY, elements, "FMA input A")?;
        let mut buf_b = self.create_buffer(CL_MEM_READ_ONLY, elements, "FMA input B")?;
        let mut buf_c = self.create_buffer(CL_MEM_READ_WRITE, elements, "FMA accumulator")?;

        self.write_buffer(&mut buf_a, &host_a, "upload FMA input A")?;
        self.write_buffer(&mut buf_b, &host_b, "upload FMA input B")?;
        self.write_buffer(&mut buf_c, &host_c, "upload FMA accumulator")?;

        let start = Instant::now();
        let event = unsafe {
            let mut exec = ExecuteKernel::new(&self.fma_kernel);
            exec.set_arg(&buf_a.get())
                .set_arg(&buf_b.get())
                .set_arg(&buf_c.get())
                .set_arg(&(elements as cl_uint))
                .set_arg(&iterations)
                .set_global_work_sizes(&[elements]);
            if elements % FMA_GROUP == 0 {
                exec.set_local_work_sizes(&[FMA_GROUP]);
            }
            exec.enqueue_nd_range(self.queue.get())
                .map_err(|e| BackendError::Call { what: "enqueue FMA stress", status: e.0 })?
        };
        self.queue
            .barrier()
            .map_err(|status| BackendError::Call { what: "queue finish", status })?;
        let wall = start.elapsed();

        Ok(RunSample { wall, profile: self.extract_profile(&event) })
    }

    fn wait_idle(&mut self) -> Result<(), BackendError> {
        self.queue
            .barrier()
            .map_err(|status| BackendError::Call { what: "queue finish", status })
    }
}
