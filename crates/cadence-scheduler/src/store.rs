use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::lifecycle::Worker;
use crate::schedule::compute_next_run;
use crate::types::{Job, JobAction, TaskInfo};

/// Ordered job records plus the worker bookkeeping, guarded as one unit by
/// the scheduler's re-entrant lock.
///
/// Methods that take jobs out of the store hand them back to the caller so
/// that their actions are dropped after the `RefCell` borrow is released:
/// dropping a closure can run arbitrary code, including calls back into the
/// scheduler.
#[derive(Default)]
pub(crate) struct JobStore {
    jobs: Vec<Job>,
    /// Largest period ever registered; never shrinks.
    max_period: Duration,
    next_id: u64,
    /// The live worker, if any. `None` means Idle.
    pub worker: Option<Worker>,
    /// Handles of workers that have left the loop but were not joined yet.
    pub retired: Vec<JoinHandle<()>>,
    /// Workers taken out by a stop that is still joining them.
    joining: Vec<ThreadId>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job first due one period from `now`. Returns its id.
    pub fn push(&mut self, name: String, action: JobAction, period: Duration, now: Instant) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        if period > self.max_period {
            self.max_period = period;
        }
        self.jobs.push(Job {
            id,
            name,
            period,
            next_run: compute_next_run(now, period),
            action: Some(action),
            consecutive_failures: 0,
            removed: false,
        });
        id
    }

    pub fn max_period(&self) -> Duration {
        self.max_period
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Job> {
        self.jobs.get_mut(index)
    }

    pub fn find_mut(&mut self, id: u64) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    /// True iff a non-removed job has exactly this name.
    pub fn has(&self, name: &str) -> bool {
        self.jobs.iter().any(|job| !job.removed && job.name == name)
    }

    /// Mark the first non-removed job named `name`. Returns whether one was found.
    pub fn mark_removed(&mut self, name: &str) -> bool {
        match self.jobs.iter_mut().find(|job| !job.removed && job.name == name) {
            Some(job) => {
                job.removed = true;
                true
            }
            None => false,
        }
    }

    /// Mark every non-removed job whose name starts with `prefix`, in one
    /// pass over a consistent snapshot. Returns how many were marked.
    pub fn mark_matching(&mut self, prefix: &str) -> usize {
        let mut marked = 0;
        for job in self
            .jobs
            .iter_mut()
            .filter(|job| !job.removed && job.name.starts_with(prefix))
        {
            job.removed = true;
            marked += 1;
        }
        marked
    }

    /// Remove every job, returning them for the caller to drop.
    pub fn clear(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    /// Physically erase removed jobs and jobs over the retry limit.
    pub fn purge(&mut self, retry_limit: u32) -> Vec<Job> {
        if !self.jobs.iter().any(|job| job.is_purgeable(retry_limit)) {
            return Vec::new();
        }
        let (purged, kept): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|job| job.is_purgeable(retry_limit));
        self.jobs = kept;

        for job in &purged {
            if job.removed {
                debug!(job = %job.name, "periodic task removed");
            } else {
                info!(
                    job = %job.name,
                    failures = job.consecutive_failures,
                    "periodic task evicted after repeated failures"
                );
            }
        }
        purged
    }

    /// Drop a job that was just added (used when the worker cannot be spawned).
    pub fn discard(&mut self, id: u64) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.id == id)?;
        Some(self.jobs.remove(index))
    }

    /// Wake the worker so it reconsiders its deadline and purges promptly.
    pub fn notify_worker(&self) {
        if let Some(worker) = &self.worker {
            worker.signal.notify();
        }
    }

    /// Join retired workers whose entry function has already returned.
    pub fn reap_finished(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|handle| handle.is_finished());
        self.retired = running;
        for handle in finished {
            if handle.join().is_err() {
                error!("periodic task worker panicked");
            }
        }
    }

    /// Whether `id` is a worker of this store that has not been joined yet:
    /// the live one, a retired one, or one a stop is currently joining.
    pub fn is_worker_thread(&self, id: ThreadId) -> bool {
        self.joining.contains(&id)
            || self
                .worker
                .iter()
                .filter_map(|worker| worker.handle.as_ref())
                .chain(self.retired.iter())
                .any(|handle| handle.thread().id() == id)
    }

    /// Detach the live and retired workers for joining, remembering their
    /// thread ids until [`JobStore::end_stop`].
    pub fn begin_stop(&mut self) -> (Option<Worker>, Vec<JoinHandle<()>>, Vec<ThreadId>) {
        let worker = self.worker.take();
        let retired = std::mem::take(&mut self.retired);
        let ids: Vec<ThreadId> = worker
            .iter()
            .filter_map(|worker| worker.handle.as_ref())
            .chain(retired.iter())
            .map(|handle| handle.thread().id())
            .collect();
        self.joining.extend(ids.iter().copied());
        (worker, retired, ids)
    }

    /// Forget the ids of a finished stop and park the handles it could not join.
    pub fn end_stop(&mut self, ids: &[ThreadId], deferred: Vec<JoinHandle<()>>) {
        self.joining.retain(|id| !ids.contains(id));
        self.retired.extend(deferred);
    }

    pub fn snapshot(&self, now: Instant) -> Vec<TaskInfo> {
        self.jobs
            .iter()
            .filter(|job| !job.removed)
            .map(|job| job.info(now))
            .collect()
    }
}
