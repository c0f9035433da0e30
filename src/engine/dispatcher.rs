//! Conflict-driven system dispatch.
//!
//! The dispatcher keeps a record of every background system still running.
//! Before any new dispatch, it joins every running system whose **write**
//! mask overlaps the new system's full access. Only writes create
//! conflicts, so concurrent readers of the same component never wait on
//! each other, and a purely-reading system never waits on a prior
//! purely-reading one.
//!
//! At the tick boundary every worker is joined, in arbitrary order, so
//! that no workers run between ticks.

use std::panic;
use std::sync::Mutex;
use std::thread::JoinHandle;

use log::debug;

use crate::engine::types::ComponentMask;

/// Record of an asynchronously dispatched system.
///
/// `worker` is `None` once the thread has been joined; joined records are
/// purged from the running list at the end of every conflict scan.
pub(crate) struct RunningSystem {
    read_mask: ComponentMask,
    write_mask: ComponentMask,
    worker: Option<JoinHandle<()>>,
}

/// Tracks running background systems and enforces the write-conflict rule.
pub(crate) struct SystemDispatcher {
    running: Mutex<Vec<RunningSystem>>,
}

impl SystemDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            running: Mutex::new(Vec::new()),
        }
    }

    /// Joins every running system whose writes overlap `read | write`,
    /// then purges all joined records.
    ///
    /// Called before every dispatch; blocks the caller until the
    /// conflicting workers complete.
    pub(crate) fn wait_for_conflicts(&self, read: ComponentMask, write: ComponentMask) {
        let mut running = self.running.lock().expect("running-system list poisoned");
        let interest = read | write;
        for system in running.iter_mut() {
            if system.write_mask.intersects(interest) {
                debug!(
                    "dispatch (read {:#x}, write {:#x}) joining conflicting system (write {:#x})",
                    read.bits(),
                    write.bits(),
                    system.write_mask.bits(),
                );
                join_worker(&mut system.worker);
            }
        }
        running.retain(|system| system.worker.is_some());
    }

    /// Records a freshly spawned background worker.
    pub(crate) fn register(
        &self,
        read_mask: ComponentMask,
        write_mask: ComponentMask,
        worker: JoinHandle<()>,
    ) {
        debug!(
            "background system started (read {:#x}, write {:#x})",
            read_mask.bits(),
            write_mask.bits(),
        );
        self.running
            .lock()
            .expect("running-system list poisoned")
            .push(RunningSystem {
                read_mask,
                write_mask,
                worker: Some(worker),
            });
    }

    /// Joins every running worker, in arbitrary order, and clears the
    /// list.
    pub(crate) fn join_all(&self) {
        let mut running = self.running.lock().expect("running-system list poisoned");
        for system in running.iter_mut() {
            debug!(
                "joining system (read {:#x}, write {:#x}) at tick boundary",
                system.read_mask.bits(),
                system.write_mask.bits(),
            );
            join_worker(&mut system.worker);
        }
        running.clear();
    }
}

/// A panic escaping a worker is fatal to the dispatching thread: the
/// unwind resumes at the join point.
fn join_worker(worker: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = worker.take() {
        if let Err(payload) = handle.join() {
            panic::resume_unwind(payload);
        }
    }
}
