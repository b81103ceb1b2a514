use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use cadence_hooks::engine::panic_message;
use tracing::{debug, trace};

use crate::lifecycle::{retire_worker, WorkerSignal};
use crate::schedule::{compute_next_run, WakeDeadline};
use crate::scheduler::Shared;
use crate::types::{JobAction, JobFailure};

/// Worker thread body. Returns when the store empties or the worker is stopped.
pub(crate) fn run(shared: Arc<Shared>, signal: Arc<WorkerSignal>) {
    debug!("periodic task loop entered");
    while !signal.is_terminated() {
        let Some(deadline) = run_due_jobs(&shared, &signal) else {
            break;
        };
        if !purge(&shared, &signal) {
            break;
        }
        if signal.wait_until(deadline) {
            break;
        }
    }
    debug!("periodic task loop exited");
}

/// One pass over the store in registration order. Executes due jobs and
/// returns the next wake deadline, or `None` once termination is observed.
///
/// The job lock is held for the whole pass so executions are serialised
/// against store mutations; the `RefCell` borrow is released around each
/// action so the action may call back into the scheduler.
fn run_due_jobs(shared: &Shared, signal: &WorkerSignal) -> Option<Instant> {
    let now = Instant::now();
    let guard = shared.jobs.lock();
    let mut deadline = WakeDeadline::new(now, guard.borrow().max_period());

    let mut index = 0;
    loop {
        if signal.is_terminated() {
            return None;
        }

        let (id, name, mut action) = {
            let mut store = guard.borrow_mut();
            let Some(job) = store.get_mut(index) else {
                break;
            };
            index += 1;
            if job.removed {
                continue;
            }
            if !job.is_due(now) {
                deadline.fold(job.next_run);
                continue;
            }
            let Some(action) = job.action.take() else {
                continue;
            };
            (job.id, job.name.clone(), action)
        };

        trace!(job = %name, "running periodic task");
        let outcome = execute(&mut action);
        if let Err(failure) = &outcome {
            shared.sink.job_failed(&name, failure);
        }

        // The job may have been cleared away by its own action.
        let orphan = {
            let mut store = guard.borrow_mut();
            match store.find_mut(id) {
                Some(job) => {
                    job.action = Some(action);
                    job.record(outcome.is_ok());
                    job.next_run = compute_next_run(Instant::now(), job.period);
                    deadline.fold(job.next_run);
                    None
                }
                None => Some(action),
            }
        };
        drop(orphan);
    }

    Some(deadline.instant())
}

/// Erase removed and failing jobs. Returns `false` when the store is empty
/// and this worker should go idle.
fn purge(shared: &Shared, signal: &Arc<WorkerSignal>) -> bool {
    let guard = shared.jobs.lock();
    let (purged, keep_running) = {
        let mut store = guard.borrow_mut();
        let purged = store.purge(shared.config.retry_limit);
        if store.is_empty() {
            retire_worker(&mut store, signal);
            (purged, false)
        } else {
            (purged, true)
        }
    };
    drop(purged);
    keep_running
}

fn execute(action: &mut JobAction) -> Result<(), JobFailure> {
    match catch_unwind(AssertUnwindSafe(|| action())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(JobFailure::Errored(format!("{e:#}"))),
        Err(payload) => Err(JobFailure::Panicked(panic_message(payload.as_ref()))),
    }
}
