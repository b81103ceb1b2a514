use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_core::config::{HookBundle, SchedulerConfig};
use cadence_hooks::{CustomHooks, ThreadHooks};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::lifecycle::{start_worker, stop_workers};
use crate::sink::{DiagnosticSink, TracingSink};
use crate::store::JobStore;
use crate::types::TaskInfo;

/// State shared between the public handle and its worker thread.
pub(crate) struct Shared {
    /// Re-entrant so a task's action may call back into the scheduler from
    /// the worker thread while the loop holds the lock.
    pub jobs: ReentrantMutex<RefCell<JobStore>>,
    /// Serialises stops requested from outside the worker, so every such
    /// caller returns only once the join has completed. Never taken while
    /// the job lock is held.
    pub stopping: Mutex<()>,
    pub hooks: RwLock<ThreadHooks>,
    pub sink: Arc<dyn DiagnosticSink>,
    pub config: SchedulerConfig,
}

/// Runs named periodic tasks on one background worker thread.
///
/// Every method may be called from any thread, including from inside a
/// task's own action. Dropping the scheduler stops the worker synchronously.
pub struct PeriodicScheduler {
    shared: Arc<Shared>,
}

impl PeriodicScheduler {
    /// Create a scheduler that reports failures through `tracing`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: SchedulerConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let hooks = ThreadHooks::Bundle(config.hooks);
        Self {
            shared: Arc::new(Shared {
                jobs: ReentrantMutex::new(RefCell::new(JobStore::new())),
                stopping: Mutex::new(()),
                hooks: RwLock::new(hooks),
                sink,
                config,
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Register an infallible action run every `period`, first one period from now.
    ///
    /// A panic inside `action` counts as a failed execution.
    pub fn add_periodic_task<F>(
        &self,
        name: impl Into<String>,
        mut action: F,
        period: Duration,
    ) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.add_fallible_task(
            name,
            move || {
                action();
                Ok(())
            },
            period,
        )
    }

    /// Register an action whose `Err` return counts as a failed execution.
    ///
    /// Starts the worker thread if none is running; otherwise wakes it so the
    /// new deadline is taken into account immediately.
    pub fn add_fallible_task<F>(
        &self,
        name: impl Into<String>,
        action: F,
        period: Duration,
    ) -> Result<()>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.into();
        validate_period(&name, period)?;

        let guard = self.shared.jobs.lock();
        let (id, needs_worker) = {
            let mut store = guard.borrow_mut();
            let id = store.push(name.clone(), Box::new(action), period, Instant::now());
            debug!(job = %name, period_ms = period.as_millis() as u64, "periodic task added");
            if store.worker.is_some() {
                store.notify_worker();
            }
            (id, store.worker.is_none())
        };

        if needs_worker {
            if let Err(e) = start_worker(&self.shared, &guard) {
                let discarded = guard.borrow_mut().discard(id);
                drop(discarded);
                return Err(SchedulerError::Spawn(e));
            }
        }
        Ok(())
    }

    /// True iff a task with exactly this name is registered and not removed.
    pub fn has_periodic_task(&self, name: &str) -> bool {
        let guard = self.shared.jobs.lock();
        let found = guard.borrow().has(name);
        found
    }

    /// Remove the first task named `name`. Returns whether one was found.
    ///
    /// Removal is cooperative: a task that is already due may run one last
    /// time before the worker notices.
    pub fn remove_periodic_task(&self, name: &str) -> bool {
        let guard = self.shared.jobs.lock();
        let mut store = guard.borrow_mut();
        let removed = store.mark_removed(name);
        if removed {
            debug!(job = %name, "periodic task marked for removal");
            store.notify_worker();
        }
        removed
    }

    /// Remove every task whose name starts with `prefix` (including a task
    /// named exactly `prefix`). Returns how many were removed.
    pub fn remove_periodic_tasks_matching(&self, prefix: &str) -> usize {
        let guard = self.shared.jobs.lock();
        let mut store = guard.borrow_mut();
        let marked = store.mark_matching(prefix);
        debug!(%prefix, count = marked, "periodic tasks marked for removal");
        store.notify_worker();
        marked
    }

    /// Remove every task and stop the worker thread.
    ///
    /// Synchronous: when called from outside the worker, the worker has
    /// exited by the time this returns, even if another thread is stopping
    /// it concurrently. When called from a task's action the stop is
    /// requested and the loop exits as soon as the action returns.
    pub fn remove_all_periodic_tasks(&self) {
        // Callers already inside the scheduler (a task, a hook on the worker,
        // a started hook during an add) must not wait on an outside stop that
        // is itself waiting for them.
        let nested = self.shared.jobs.is_owned_by_current_thread() || {
            let guard = self.shared.jobs.lock();
            let on_worker = guard.borrow().is_worker_thread(std::thread::current().id());
            on_worker
        };
        let _stopping = (!nested).then(|| self.shared.stopping.lock());

        let (cleared, worker, retired, ids) = {
            let guard = self.shared.jobs.lock();
            let mut store = guard.borrow_mut();
            let (worker, retired, ids) = store.begin_stop();
            (store.clear(), worker, retired, ids)
        };
        if !cleared.is_empty() {
            info!(count = cleared.len(), "removing all periodic tasks");
        }
        drop(cleared);

        let deferred = stop_workers(worker, retired);
        let guard = self.shared.jobs.lock();
        guard.borrow_mut().end_stop(&ids, deferred);
    }

    /// Install one of the fixed hook bundles for threads started from now on.
    pub fn configure(&self, bundle: HookBundle) {
        debug!(%bundle, "worker hooks configured");
        *self.shared.hooks.write() = ThreadHooks::Bundle(bundle);
    }

    /// Install a fully custom hook set for threads started from now on.
    pub fn configure_funcs(&self, hooks: CustomHooks) {
        debug!(?hooks, "custom worker hooks configured");
        *self.shared.hooks.write() = ThreadHooks::Custom(hooks);
    }

    /// The hook set the next worker thread will be started with.
    pub fn hooks(&self) -> ThreadHooks {
        self.shared.hooks.read().clone()
    }

    /// Snapshot of live tasks in registration order.
    pub fn periodic_tasks(&self) -> Vec<TaskInfo> {
        let guard = self.shared.jobs.lock();
        let tasks = guard.borrow().snapshot(Instant::now());
        tasks
    }

    /// Whether a worker thread is currently attached to this scheduler.
    pub fn is_worker_running(&self) -> bool {
        let guard = self.shared.jobs.lock();
        let running = guard.borrow().worker.is_some();
        running
    }
}

impl Default for PeriodicScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.remove_all_periodic_tasks();
    }
}

fn validate_period(name: &str, period: Duration) -> Result<()> {
    if period.is_zero() {
        return Err(SchedulerError::InvalidPeriod {
            name: name.to_string(),
            reason: "period must be positive".to_string(),
        });
    }
    if Instant::now().checked_add(period).is_none() {
        return Err(SchedulerError::InvalidPeriod {
            name: name.to_string(),
            reason: "period is too large".to_string(),
        });
    }
    Ok(())
}
