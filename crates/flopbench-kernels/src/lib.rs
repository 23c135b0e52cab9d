//! Arithmetic kernels for the flopbench scenarios.
//!
//! The CPU workers in [`cpu`] operate on caller-partitioned slices; the
//! OpenCL source below carries the matching device entry points.

pub mod cpu;

/// OpenCL source for both benchmark entry points.
pub const MATRIX_KERNELS_SRC: &str = include_str!("../cl/matrix_kernels.cl");

/// Entry point name of the naive matrix-multiply kernel.
pub const KERNEL_MATRIX_MULTIPLY: &str = "matrix_multiply";

/// Entry point name of the FMA stress kernel.
pub const KERNEL_FMA_STRESS: &str = "fma_stress";
