//! Process-wide scheduler instance.
//!
//! The instance is built lazily and exactly once, on the first call to
//! [`global`] or [`init_global`], from whichever thread gets there first.
//! Statics are never dropped, so teardown is explicit: call
//! [`shutdown_global`] before the process exits to stop the worker thread
//! synchronously.

use std::sync::OnceLock;

use cadence_core::config::SchedulerConfig;
use tracing::info;

use crate::error::{Result, SchedulerError};
use crate::scheduler::PeriodicScheduler;

static GLOBAL: OnceLock<PeriodicScheduler> = OnceLock::new();

/// The process-wide scheduler, created with default settings on first use.
pub fn global() -> &'static PeriodicScheduler {
    GLOBAL.get_or_init(|| {
        info!("creating process-wide periodic scheduler");
        PeriodicScheduler::default()
    })
}

/// Create the process-wide scheduler from `config`.
///
/// Fails with [`SchedulerError::AlreadyInitialized`] if it already exists,
/// whether from an earlier `init_global` or a call to [`global`].
pub fn init_global(config: SchedulerConfig) -> Result<&'static PeriodicScheduler> {
    let mut created = false;
    let scheduler = GLOBAL.get_or_init(|| {
        created = true;
        info!(
            retry_limit = config.retry_limit,
            hooks = %config.hooks,
            "creating process-wide periodic scheduler"
        );
        PeriodicScheduler::new(config)
    });
    if created {
        Ok(scheduler)
    } else {
        Err(SchedulerError::AlreadyInitialized)
    }
}

/// Teardown hook: remove every task and join the worker, if the
/// process-wide scheduler was ever created. The instance stays usable.
pub fn shutdown_global() {
    if let Some(scheduler) = GLOBAL.get() {
        scheduler.remove_all_periodic_tasks();
    }
}
