//! Worker thread lifecycle: on-demand start, idle exit, synchronous stop.
//!
//! Each worker owns a [`WorkerSignal`]; a stopped worker's signal stays
//! terminated even if a replacement is spawned before it has unwound.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::engine;
use crate::scheduler::Shared;
use crate::store::JobStore;
use crate::thread::create_thread;

#[derive(Debug, Default)]
struct WakeState {
    terminated: bool,
    /// Set by `notify` so a wake-up sent while the worker is busy is not lost.
    notified: bool,
}

/// Termination flag plus the interruptible wait the worker sleeps in.
#[derive(Debug, Default)]
pub(crate) struct WorkerSignal {
    state: Mutex<WakeState>,
    condvar: Condvar,
}

impl WorkerSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut state = self.state.lock();
        state.notified = true;
        self.condvar.notify_one();
    }

    pub fn terminate(&self) {
        let mut state = self.state.lock();
        state.terminated = true;
        self.condvar.notify_all();
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    /// Sleep until `deadline` or the next notification. Returns whether the
    /// worker has been told to terminate.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        if !state.notified && !state.terminated {
            let _ = self.condvar.wait_until(&mut state, deadline);
        }
        state.notified = false;
        state.terminated
    }
}

/// The live worker as recorded in the job store.
pub(crate) struct Worker {
    pub signal: Arc<WorkerSignal>,
    /// `None` only while the spawn that created this worker is in progress.
    pub handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn owns(&self, signal: &Arc<WorkerSignal>) -> bool {
        Arc::ptr_eq(&self.signal, signal)
    }
}

/// Start a worker for `shared`. The caller holds the job lock (not a borrow)
/// and has checked that no worker is alive.
pub(crate) fn start_worker(
    shared: &Arc<Shared>,
    guard: &std::cell::RefCell<JobStore>,
) -> std::io::Result<()> {
    let signal = Arc::new(WorkerSignal::new());
    {
        let mut store = guard.borrow_mut();
        store.reap_finished();
        store.worker = Some(Worker {
            signal: Arc::clone(&signal),
            handle: None,
        });
    }

    let hooks = shared.hooks.read().clone();
    let entry_shared = Arc::clone(shared);
    let entry_signal = Arc::clone(&signal);
    // The started hook runs inside create_thread with no borrow held, so it
    // may call back into the scheduler.
    let spawned = create_thread(
        &shared.config.thread_name,
        hooks,
        Arc::clone(&shared.sink),
        move || engine::run(entry_shared, entry_signal),
    );

    let mut store = guard.borrow_mut();
    let ours = store.worker.as_ref().is_some_and(|worker| worker.owns(&signal));
    match spawned {
        Ok(handle) => {
            if ours {
                if let Some(worker) = store.worker.as_mut() {
                    worker.handle = Some(handle);
                }
            } else {
                // Stopped from inside the started hook; the signal is already terminated.
                store.retired.push(handle);
            }
            info!(thread = %shared.config.thread_name, "periodic task worker started");
            Ok(())
        }
        Err(e) => {
            if ours {
                store.worker = None;
            }
            error!(error = %e, "failed to spawn periodic task worker");
            Err(e)
        }
    }
}

/// Called by the worker itself when the store has become empty.
///
/// Moves its own handle to the retired list so a later spawn or stop joins it.
pub(crate) fn retire_worker(store: &mut JobStore, signal: &Arc<WorkerSignal>) {
    if store.worker.as_ref().is_some_and(|worker| worker.owns(signal)) {
        if let Some(Worker { handle: Some(handle), .. }) = store.worker.take() {
            store.retired.push(handle);
        }
        debug!("periodic task worker going idle");
    }
}

/// Terminate `worker` and join it plus every retired handle.
///
/// Returns the handles that could not be joined because they belong to the
/// calling thread (a stop requested from inside a task or a worker hook).
pub(crate) fn stop_workers(
    worker: Option<Worker>,
    retired: Vec<JoinHandle<()>>,
) -> Vec<JoinHandle<()>> {
    let mut handles = retired;
    if let Some(worker) = worker {
        worker.signal.terminate();
        handles.extend(worker.handle);
    }

    let current = std::thread::current().id();
    let mut deferred = Vec::new();
    for handle in handles {
        if handle.thread().id() == current {
            deferred.push(handle);
            continue;
        }
        if handle.join().is_err() {
            error!("periodic task worker panicked");
        }
    }
    if deferred.is_empty() {
        debug!("periodic task worker stopped");
    }
    deferred
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn wait_times_out_at_the_deadline() {
        let signal = WorkerSignal::new();
        let start = Instant::now();
        let terminated = signal.wait_until(start + Duration::from_millis(30));
        assert!(!terminated);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pending_notification_skips_the_wait() {
        let signal = WorkerSignal::new();
        signal.notify();
        let start = Instant::now();
        assert!(!signal.wait_until(start + Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        // The notification was consumed.
        let start = Instant::now();
        signal.wait_until(start + Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn terminate_interrupts_a_sleeping_waiter() {
        let signal = Arc::new(WorkerSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || signal.wait_until(Instant::now() + Duration::from_secs(30)))
        };
        std::thread::sleep(Duration::from_millis(20));
        signal.terminate();
        assert!(waiter.join().unwrap());
        assert!(signal.is_terminated());
    }
}
