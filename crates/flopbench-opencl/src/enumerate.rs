//! Platform and GPU-device enumeration.

use crate::error::EnumerationError;
use opencl3::device::{Device, CL_DEVICE_TYPE_GPU};
use opencl3::platform::{get_platforms, Platform};
use tracing::debug;

/// An OpenCL platform with its display name cached.
#[derive(Debug)]
pub struct PlatformEntry {
    /// The raw opencl3 platform handle.
    pub platform: Platform,
    /// Human-readable platform name.
    pub name: String,
}

/// A GPU device with its queryable attributes cached at enumeration time.
#[derive(Debug)]
pub struct GpuDeviceInfo {
    /// The raw opencl3 device handle.
    pub device: Device,
    /// Human-readable device name.
    pub name: String,
    /// Device vendor string.
    pub vendor: String,
    /// Number of parallel compute units.
    pub compute_units: u32,
    /// Global memory size in bytes.
    pub global_mem_bytes: u64,
    /// Maximum clock frequency in MHz.
    pub max_clock_mhz: u32,
    /// Maximum work-group size for kernel dispatch.
    pub max_work_group_size: usize,
}

impl GpuDeviceInfo {
    /// Query and cache the attributes of `device`.
    ///
    /// Individual attribute queries that fail leave the field at its zero
    /// value; enumeration itself never fails over one unreadable attribute.
    #[must_use]
    pub fn query(device: Device) -> Self {
        let name = device.name().unwrap_or_default();
        let vendor = device.vendor().unwrap_or_default();
        let compute_units = device.max_compute_units().unwrap_or_default();
        let global_mem_bytes = device.global_mem_size().unwrap_or_default();
        let max_clock_mhz = device.max_clock_frequency().unwrap_or_default();
        let max_work_group_size = device.max_work_group_size().unwrap_or_default();
        Self {
            device,
            name,
            vendor,
            compute_units,
            global_mem_bytes,
            max_clock_mhz,
            max_work_group_size,
        }
    }
}

/// One platform together with every GPU device it exposes.
#[derive(Debug)]
pub struct PlatformCandidates {
    pub platform: PlatformEntry,
    pub devices: Vec<GpuDeviceInfo>,
}

/// Enumerate all OpenCL platforms and the GPU devices under each.
///
/// Platforms without GPU devices stay in the result (the selector skips
/// them); the whole enumeration fails only when there are no platforms at
/// all, or when no platform exposes even one GPU device. CPU-class and
/// default-class devices are never considered.
pub fn enumerate_gpu_platforms() -> Result<Vec<PlatformCandidates>, EnumerationError> {
    let platforms = get_platforms().map_err(|_e| EnumerationError::NoPlatforms)?;
    if platforms.is_empty() {
        return Err(EnumerationError::NoPlatforms);
    }

    let mut candidates = Vec::with_capacity(platforms.len());
    let mut total_devices = 0usize;

    for platform in platforms {
        let name = platform.name().unwrap_or_default();
        debug!("scanning OpenCL platform: {name}");

        let device_ids = platform.get_devices(CL_DEVICE_TYPE_GPU).unwrap_or_default();
        let devices: Vec<GpuDeviceInfo> = device_ids
            .into_iter()
            .map(|id| GpuDeviceInfo::query(Device::new(id)))
            .collect();

        for dev in &devices {
            debug!("found GPU: {} (vendor: {})", dev.name, dev.vendor);
        }
        total_devices += devices.len();

        candidates.push(PlatformCandidates { platform: PlatformEntry { platform, name }, devices });
    }

    if total_devices == 0 {
        return Err(EnumerationError::NoGpuDevices);
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_does_not_panic_without_hardware() {
        // On machines without an ICD loader this returns NoPlatforms; with
        // one but no GPU it returns NoGpuDevices. Either is acceptable here.
        match enumerate_gpu_platforms() {
            Ok(candidates) => assert!(candidates.iter().any(|c| !c.devices.is_empty())),
            Err(EnumerationError::NoPlatforms | EnumerationError::NoGpuDevices) => {}
        }
    }
}
