//! Resource release-ordering tests against a mock queue.
//!
//! Queue release must never precede a matching completion barrier, on any
//! code path, including early exits where the guard is dropped mid-scenario.

use flopbench_opencl::{QueueGuard, QueueOps};
use opencl3::types::cl_int;
use std::cell::RefCell;
use std::rc::Rc;

type CallLog = Rc<RefCell<Vec<&'static str>>>;

struct MockQueue {
    log: CallLog,
}

impl QueueOps for MockQueue {
    fn barrier(&self) -> Result<(), cl_int> {
        self.log.borrow_mut().push("barrier");
        Ok(())
    }
}

impl Drop for MockQueue {
    fn drop(&mut self) {
        self.log.borrow_mut().push("release");
    }
}

fn new_guard() -> (QueueGuard<MockQueue>, CallLog) {
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let guard = QueueGuard::new(MockQueue { log: Rc::clone(&log) });
    (guard, log)
}

#[test]
fn drop_runs_barrier_before_release() {
    let (guard, log) = new_guard();
    drop(guard);
    assert_eq!(*log.borrow(), vec!["barrier", "release"]);
}

#[test]
fn explicit_release_runs_barrier_first_and_drop_is_then_inert() {
    let (mut guard, log) = new_guard();
    guard.release();
    assert_eq!(*log.borrow(), vec!["barrier", "release"]);

    drop(guard);
    // No second barrier/release pair.
    assert_eq!(*log.borrow(), vec!["barrier", "release"]);
}

#[test]
fn mid_run_barriers_do_not_release_the_queue() {
    let (guard, log) = new_guard();
    guard.barrier().unwrap();
    guard.barrier().unwrap();
    assert_eq!(*log.borrow(), vec!["barrier", "barrier"]);

    drop(guard);
    assert_eq!(*log.borrow(), vec!["barrier", "barrier", "barrier", "release"]);
}

#[test]
fn early_exit_error_path_still_drains_before_release() {
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));

    // A scenario that bails out after submitting work: the guard goes out
    // of scope through the error path.
    let result: Result<(), &str> = (|| {
        let guard = QueueGuard::new(MockQueue { log: Rc::clone(&log) });
        guard.barrier().map_err(|_| "submit failed")?;
        Err("buffer creation failed")
    })();

    assert!(result.is_err());
    // One mid-run barrier, then the drop-time drain, then the release.
    assert_eq!(*log.borrow(), vec!["barrier", "barrier", "release"]);
}
