//! Context and command-queue construction.
//!
//! Queue creation goes through the deprecated OpenCL 1.x entry point by
//! default. The newer properties-array entry point hangs inside at least
//! one vendor driver family on the hardware this harness targets, and a
//! hang cannot be caught and retried, so there is no automatic fallback
//! in either direction. The modern path exists only behind an explicit
//! operator opt-in, and the legacy path's reduced expressiveness (a flat
//! bitmask instead of a properties array) is an accepted trade.

use crate::enumerate::GpuDeviceInfo;
use crate::error::ResourceError;
use crate::selector::SelectedDevice;
use opencl3::command_queue::{
    CommandQueue, CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE, CL_QUEUE_PROFILING_ENABLE,
};
use opencl3::context::Context;
use opencl3::types::{cl_command_queue_properties, cl_int};
use tracing::debug;

/// Queue properties expressible through the legacy entry point: a flat
/// bitmask of two independent flags. Any subset is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueProperties {
    pub profiling: bool,
    pub out_of_order: bool,
}

impl QueueProperties {
    #[must_use]
    pub const fn none() -> Self {
        Self { profiling: false, out_of_order: false }
    }

    #[must_use]
    pub const fn with_profiling(mut self) -> Self {
        self.profiling = true;
        self
    }

    #[must_use]
    pub const fn with_out_of_order(mut self) -> Self {
        self.out_of_order = true;
        self
    }

    /// The flat `cl_command_queue_properties` bitmask.
    #[must_use]
    pub fn bitmask(self) -> cl_command_queue_properties {
        let mut props: cl_command_queue_properties = 0;
        if self.profiling {
            props |= CL_QUEUE_PROFILING_ENABLE;
        }
        if self.out_of_order {
            props |= CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE;
        }
        props
    }
}

/// Which construction entry point to use. `Legacy` is the default and is
/// never silently abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueStrategy {
    /// `clCreateCommandQueue`: deprecated since OpenCL 2.0, flat bitmask
    /// only, stable on every driver this harness has met.
    #[default]
    Legacy,
    /// `clCreateCommandQueueWithProperties`: richer properties array;
    /// hangs on the AMD APP driver family. Explicit opt-in only.
    Modern,
}

/// What a construction path can and cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCapabilities {
    /// Only the two-flag bitmask is available; no extended properties.
    pub flat_bitmask_only: bool,
    /// The path can pass an on-device queue size hint.
    pub supports_queue_size_hint: bool,
    /// The path can request device-side (on-device) queues.
    pub supports_on_device_queues: bool,
}

impl QueueStrategy {
    #[must_use]
    pub const fn capabilities(self) -> PathCapabilities {
        match self {
            Self::Legacy => PathCapabilities {
                flat_bitmask_only: true,
                supports_queue_size_hint: false,
                supports_on_device_queues: false,
            },
            Self::Modern => PathCapabilities {
                flat_bitmask_only: false,
                supports_queue_size_hint: true,
                supports_on_device_queues: true,
            },
        }
    }

    #[must_use]
    pub const fn entry_point_name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        }
    }
}

/// The two construction entry points, abstracted so tests can observe
/// which one actually runs.
pub trait QueueConstructor {
    type Queue;

    /// `clCreateCommandQueue`, flat bitmask.
    fn create_legacy(&mut self, props: QueueProperties) -> Result<Self::Queue, cl_int>;

    /// `clCreateCommandQueueWithProperties`, properties array.
    fn create_modern(&mut self, props: QueueProperties) -> Result<Self::Queue, cl_int>;
}

/// Build a queue through exactly the entry point `strategy` names.
///
/// A non-success status surfaces as [`ResourceError::Queue`] with the raw
/// status code; it is never retried here and never rerouted to the other
/// entry point.
pub fn build_queue_with<C: QueueConstructor>(
    ctor: &mut C,
    strategy: QueueStrategy,
    props: QueueProperties,
) -> Result<C::Queue, ResourceError> {
    debug!(
        "creating command queue via {} path (profiling={}, out_of_order={})",
        strategy.entry_point_name(),
        props.profiling,
        props.out_of_order
    );
    let result = match strategy {
        QueueStrategy::Legacy => ctor.create_legacy(props),
        QueueStrategy::Modern => ctor.create_modern(props),
    };
    result.map_err(|status| ResourceError::Queue {
        entry_point: strategy.entry_point_name(),
        status,
    })
}

/// Live constructor over a real context and device.
pub struct ClQueueConstructor<'a> {
    pub context: &'a Context,
    pub device: &'a GpuDeviceInfo,
}

impl QueueConstructor for ClQueueConstructor<'_> {
    type Queue = CommandQueue;

    // The deprecation is the point: the replacement entry point is the one
    // that hangs.
    #[allow(deprecated)]
    fn create_legacy(&mut self, props: QueueProperties) -> Result<CommandQueue, cl_int> {
        unsafe { CommandQueue::create(self.context, self.device.device.id(), props.bitmask()) }
            .map_err(|e| e.0)
    }

    fn create_modern(&mut self, props: QueueProperties) -> Result<CommandQueue, cl_int> {
        unsafe {
            CommandQueue::create_with_properties(
                self.context,
                self.device.device.id(),
                props.bitmask(),
                0,
            )
        }
        .map_err(|e| e.0)
    }
}

/// Create an execution context scoped to the selected device.
pub fn build_context(selected: &SelectedDevice) -> Result<Context, ResourceError> {
    Context::from_device(&selected.device.device)
        .map_err(|e| ResourceError::Context { status: e.0 })
}

/// Create a command queue on `context` for the selected device.
pub fn build_queue(
    context: &Context,
    selected: &SelectedDevice,
    strategy: QueueStrategy,
    props: QueueProperties,
) -> Result<CommandQueue, ResourceError> {
    let mut ctor = ClQueueConstructor { context, device: &selected.device };
    build_queue_with(&mut ctor, strategy, props)
}

/// Minimal queue surface needed by [`QueueGuard`].
pub trait QueueOps {
    /// Full-queue completion barrier: returns once every submitted unit of
    /// work has finished.
    fn barrier(&self) -> Result<(), cl_int>;
}

impl QueueOps for CommandQueue {
    fn barrier(&self) -> Result<(), cl_int> {
        self.finish().map_err(|e| e.0)
    }
}

/// Single-owner queue wrapper that runs a completion barrier before the
/// queue handle is released, on every exit path including unwinds.
#[derive(Debug)]
pub struct QueueGuard<Q: QueueOps> {
    inner: Option<Q>,
}

impl<Q: QueueOps> QueueGuard<Q> {
    #[must_use]
    pub fn new(queue: Q) -> Self {
        Self { inner: Some(queue) }
    }

    /// Access the underlying queue for submissions.
    ///
    /// # Panics
    ///
    /// Panics if called after [`release`](Self::release).
    #[must_use]
    pub fn get(&self) -> &Q {
        self.inner.as_ref().expect("queue already released")
    }

    /// Explicit completion barrier, for timing boundaries.
    pub fn barrier(&self) -> Result<(), cl_int> {
        self.get().barrier()
    }

    /// Drain and release the queue now instead of at drop time.
    pub fn release(&mut self) {
        if let Some(queue) = self.inner.take() {
            let _ = queue.barrier();
            drop(queue);
        }
    }
}

impl<Q: QueueOps> Drop for QueueGuard<Q> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmask_combines_independent_flags() {
        assert_eq!(QueueProperties::none().bitmask(), 0);
        assert_eq!(QueueProperties::none().with_profiling().bitmask(), CL_QUEUE_PROFILING_ENABLE);
        assert_eq!(
            QueueProperties::none().with_out_of_order().bitmask(),
            CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE
        );
        assert_eq!(
            QueueProperties::none().with_profiling().with_out_of_order().bitmask(),
            CL_QUEUE_PROFILING_ENABLE | CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE
        );
    }

    #[test]
    fn default_strategy_is_legacy() {
        assert_eq!(QueueStrategy::default(), QueueStrategy::Legacy);
    }

    #[test]
    fn legacy_capabilities_are_a_strict_subset() {
        let legacy = QueueStrategy::Legacy.capabilities();
        let modern = QueueStrategy::Modern.capabilities();
        assert!(legacy.flat_bitmask_only);
        assert!(!legacy.supports_queue_size_hint);
        assert!(!legacy.supports_on_device_queues);
        assert!(!modern.flat_bitmask_only);
        assert!(modern.supports_queue_size_hint);
    }
}
