//! Profiling-timestamp extraction from completed work units.
//!
//! A profiled event carries four device timestamps (queued, submitted,
//! started, ended) that must be monotonically ordered. Each query can
//! fail independently (most commonly when the owning queue was created
//! without the profiling flag), and the failure names the exact timestamp
//! rather than collapsing into a generic error.

use crate::error::{ProfilingError, TimestampStage};
use opencl3::event::Event;
use opencl3::types::cl_int;
use serde::Serialize;
use std::time::Duration;

/// The four lifecycle timestamps of a completed work unit, each fallible
/// on its own. Implemented by the real event type and by test fakes.
pub trait EventTimestamps {
    fn queued_ns(&self) -> Result<u64, cl_int>;
    fn submitted_ns(&self) -> Result<u64, cl_int>;
    fn started_ns(&self) -> Result<u64, cl_int>;
    fn ended_ns(&self) -> Result<u64, cl_int>;
}

impl EventTimestamps for Event {
    fn queued_ns(&self) -> Result<u64, cl_int> {
        self.profiling_command_queued().map_err(|e| e.0)
    }

    fn submitted_ns(&self) -> Result<u64, cl_int> {
        self.profiling_command_submit().map_err(|e| e.0)
    }

    fn started_ns(&self) -> Result<u64, cl_int> {
        self.profiling_command_start().map_err(|e| e.0)
    }

    fn ended_ns(&self) -> Result<u64, cl_int> {
        self.profiling_command_end().map_err(|e| e.0)
    }
}

/// Validated timestamp set with derived latency spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileBreakdown {
    pub queued_ns: u64,
    pub submitted_ns: u64,
    pub started_ns: u64,
    pub ended_ns: u64,
}

impl ProfileBreakdown {
    /// Time the work unit sat in the host-side queue.
    #[must_use]
    pub fn queue_latency(&self) -> Duration {
        Duration::from_nanos(self.submitted_ns - self.queued_ns)
    }

    /// Time between submission to the device and execution start.
    #[must_use]
    pub fn dispatch_latency(&self) -> Duration {
        Duration::from_nanos(self.started_ns - self.submitted_ns)
    }

    /// Pure device execution time.
    #[must_use]
    pub fn execution_time(&self) -> Duration {
        Duration::from_nanos(self.ended_ns - self.started_ns)
    }

    /// Queued-to-ended wall span on the device clock.
    #[must_use]
    pub fn total_latency(&self) -> Duration {
        Duration::from_nanos(self.ended_ns - self.queued_ns)
    }
}

/// Device execution time (started → ended) of a profiled event.
pub fn execution_time(event: &impl EventTimestamps) -> Result<Duration, ProfilingError> {
    let started = query(event, TimestampStage::Started)?;
    let ended = query(event, TimestampStage::Ended)?;
    ensure_ordered(TimestampStage::Started, started, TimestampStage::Ended, ended)?;
    Ok(Duration::from_nanos(ended - started))
}

/// All four timestamps of a profiled event, validated for monotonicity.
///
/// Every derived span of the returned breakdown is guaranteed
/// non-negative; an out-of-order pair is reported as
/// [`ProfilingError::NonMonotonic`] naming both timestamps, never clamped.
pub fn full_breakdown(event: &impl EventTimestamps) -> Result<ProfileBreakdown, ProfilingError> {
    let queued = query(event, TimestampStage::Queued)?;
    let submitted = query(event, TimestampStage::Submitted)?;
    let started = query(event, TimestampStage::Started)?;
    let ended = query(event, TimestampStage::Ended)?;

    ensure_ordered(TimestampStage::Queued, queued, TimestampStage::Submitted, submitted)?;
    ensure_ordered(TimestampStage::Submitted, submitted, TimestampStage::Started, started)?;
    ensure_ordered(TimestampStage::Started, started, TimestampStage::Ended, ended)?;

    Ok(ProfileBreakdown {
        queued_ns: queued,
        submitted_ns: submitted,
        started_ns: started,
        ended_ns: ended,
    })
}

fn query(event: &impl EventTimestamps, stage: TimestampStage) -> Result<u64, ProfilingError> {
    let result = match stage {
        TimestampStage::Queued => event.queued_ns(),
        TimestampStage::Submitted => event.submitted_ns(),
        TimestampStage::Started => event.started_ns(),
        TimestampStage::Ended => event.ended_ns(),
    };
    result.map_err(|status| ProfilingError::TimestampUnavailable { stage, status })
}

fn ensure_ordered(
    earlier: TimestampStage,
    earlier_ns: u64,
    later: TimestampStage,
    later_ns: u64,
) -> Result<(), ProfilingError> {
    if earlier_ns > later_ns {
        return Err(ProfilingError::NonMonotonic {
            earlier,
            earlier_ns,
            later,
            later_ns,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Fake event: fixed timestamps, with optional per-stage failure.
    struct FakeEvent {
        queued: u64,
        submitted: u64,
        started: u64,
        ended: u64,
        fail: Option<TimestampStage>,
        fail_all: bool,
    }

    impl FakeEvent {
        fn ok(queued: u64, submitted: u64, started: u64, ended: u64) -> Self {
            Self { queued, submitted, started, ended, fail: None, fail_all: false }
        }

        /// Behaves like an event from a queue without the profiling flag:
        /// every timestamp query fails with the same status.
        fn unprofiled() -> Self {
            Self { fail_all: true, ..Self::ok(0, 0, 0, 0) }
        }

        fn stage(&self, stage: TimestampStage, value: u64) -> Result<u64, cl_int> {
            if self.fail_all || self.fail == Some(stage) {
                Err(-7)
            } else {
                Ok(value)
            }
        }
    }

    impl EventTimestamps for FakeEvent {
        fn queued_ns(&self) -> Result<u64, cl_int> {
            self.stage(TimestampStage::Queued, self.queued)
        }
        fn submitted_ns(&self) -> Result<u64, cl_int> {
            self.stage(TimestampStage::Submitted, self.submitted)
        }
        fn started_ns(&self) -> Result<u64, cl_int> {
            self.stage(TimestampStage::Started, self.started)
        }
        fn ended_ns(&self) -> Result<u64, cl_int> {
            self.stage(TimestampStage::Ended, self.ended)
        }
    }

    #[test]
    fn breakdown_of_valid_event() {
        let ev = FakeEvent::ok(100, 150, 400, 900);
        let b = full_breakdown(&ev).unwrap();
        assert_eq!(b.queue_latency(), Duration::from_nanos(50));
        assert_eq!(b.dispatch_latency(), Duration::from_nanos(250));
        assert_eq!(b.execution_time(), Duration::from_nanos(500));
        assert_eq!(b.total_latency(), Duration::from_nanos(800));
    }

    #[test]
    fn execution_time_of_valid_event() {
        let ev = FakeEvent::ok(0, 0, 1_000, 4_000);
        assert_eq!(execution_time(&ev).unwrap(), Duration::from_nanos(3_000));
    }

    #[test]
    fn unprofiled_queue_yields_error_not_zero() {
        let ev = FakeEvent::unprofiled();
        let err = execution_time(&ev).unwrap_err();
        assert!(matches!(err, ProfilingError::TimestampUnavailable { .. }));
    }

    #[test]
    fn breakdown_names_the_specific_failed_timestamp() {
        let ev = FakeEvent { fail: Some(TimestampStage::Submitted), ..FakeEvent::ok(1, 2, 3, 4) };
        match full_breakdown(&ev).unwrap_err() {
            ProfilingError::TimestampUnavailable { stage, status } => {
                assert_eq!(stage, TimestampStage::Submitted);
                assert_eq!(status, -7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_monotonic_timestamps_are_reported_not_clamped() {
        // started after ended: reused event or clock inconsistency.
        let ev = FakeEvent::ok(100, 200, 900, 300);
        match full_breakdown(&ev).unwrap_err() {
            ProfilingError::NonMonotonic { earlier, later, .. } => {
                assert_eq!(earlier, TimestampStage::Started);
                assert_eq!(later, TimestampStage::Ended);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    proptest! {
        /// For any ordered quadruple, the breakdown succeeds and all
        /// derived spans are non-negative by construction.
        #[test]
        fn ordered_quadruples_always_validate(
            queued in 0u64..1_000_000,
            d1 in 0u64..1_000_000,
            d2 in 0u64..1_000_000,
            d3 in 0u64..1_000_000,
        ) {
            let submitted = queued + d1;
            let started = submitted + d2;
            let ended = started + d3;
            let ev = FakeEvent::ok(queued, submitted, started, ended);
            let b = full_breakdown(&ev).unwrap();
            prop_assert_eq!(b.queue_latency(), Duration::from_nanos(d1));
            prop_assert_eq!(b.dispatch_latency(), Duration::from_nanos(d2));
            prop_assert_eq!(b.execution_time(), Duration::from_nanos(d3));
            prop_assert_eq!(
                b.total_latency(),
                Duration::from_nanos(d1 + d2 + d3)
            );
        }
    }
}
