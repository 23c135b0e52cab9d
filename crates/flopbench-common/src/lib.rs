//! Shared plumbing for the flopbench workspace.
//!
//! Provides host and GPU system probes (`/proc`, sysfs), timing-statistics
//! accumulation, and the throughput formulas used by every benchmark
//! scenario.

pub mod stats;
pub mod system_info;

pub use stats::{fma_flops, gflops, gigabytes_per_second, matmul_flops, matmul_traffic_bytes, TimingStats};
pub use system_info::{probe_gpu_power, probe_host_cpu, GpuPowerInfo, HostCpuInfo};
