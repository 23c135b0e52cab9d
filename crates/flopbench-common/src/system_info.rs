//! Host and GPU system probes for the benchmark report.
//!
//! Reads the processor model and frequency governor from `/proc` and sysfs,
//! and the discrete GPU's power-management state from the DRM sysfs tree.
//! Every probe is best-effort: a missing file produces `None` and the
//! corresponding report section is simply omitted.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Host processor information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCpuInfo {
    /// Processor model string from `/proc/cpuinfo`, if readable.
    pub model: Option<String>,
    /// Number of logical cores available to this process (always ≥ 1).
    pub logical_cores: usize,
    /// Active cpufreq governor of cpu0, if exposed.
    pub governor: Option<String>,
}

/// Power-management state of the primary discrete GPU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuPowerInfo {
    /// Contents of `power_dpm_state` (e.g. "performance", "balanced").
    pub dpm_state: Option<String>,
    /// Contents of `power_dpm_force_performance_level` (e.g. "auto").
    pub performance_level: Option<String>,
}

impl GpuPowerInfo {
    /// `true` when neither sysfs file was readable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dpm_state.is_none() && self.performance_level.is_none()
    }
}

/// Probe the host CPU.
#[must_use]
pub fn probe_host_cpu() -> HostCpuInfo {
    let model = std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|text| cpu_model_from_cpuinfo(&text));
    let logical_cores =
        std::thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(1);
    let governor = read_trimmed(Path::new(
        "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor",
    ));
    HostCpuInfo { model, logical_cores, governor }
}

/// Probe the primary GPU's power-management state (`card0`).
#[must_use]
pub fn probe_gpu_power() -> GpuPowerInfo {
    probe_gpu_power_at(Path::new("/sys/class/drm/card0/device"))
}

/// Probe GPU power-management state from an explicit DRM device directory.
#[must_use]
pub fn probe_gpu_power_at(device_dir: &Path) -> GpuPowerInfo {
    let dpm_state = read_trimmed(&device_dir.join("power_dpm_state"));
    let performance_level = read_trimmed(&device_dir.join("power_dpm_force_performance_level"));
    if dpm_state.is_none() && performance_level.is_none() {
        debug!("no DPM files under {}", device_dir.display());
    }
    GpuPowerInfo { dpm_state, performance_level }
}

/// Extract the first "model name" value from `/proc/cpuinfo` text.
fn cpu_model_from_cpuinfo(text: &str) -> Option<String> {
    text.lines()
        .find(|l| l.starts_with("model name"))
        .and_then(|l| l.split(':').nth(1))
        .map(|s| s.trim().to_owned())
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}
