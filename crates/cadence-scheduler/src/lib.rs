//! `cadence-scheduler`: background periodic-task scheduler on one worker thread.
//!
//! # Overview
//!
//! Callers register named actions with a fixed period. A single dedicated
//! worker thread runs due actions in registration order, reschedules them one
//! period after each attempt, and evicts any action that fails more than
//! `retry_limit` times in a row. The worker is spawned on the first
//! registration and exits by itself once no tasks remain;
//! [`PeriodicScheduler::remove_all_periodic_tasks`] stops it synchronously.
//!
//! Actions never run concurrently with one another, and may call back into
//! the scheduler that runs them.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cadence_scheduler::PeriodicScheduler;
//!
//! let scheduler = PeriodicScheduler::default();
//! scheduler
//!     .add_periodic_task("flush", || println!("flushing"), Duration::from_secs(1))
//!     .unwrap();
//! assert!(scheduler.has_periodic_task("flush"));
//! scheduler.remove_all_periodic_tasks();
//! ```

pub mod context;
mod engine;
pub mod error;
mod lifecycle;
pub mod schedule;
pub mod scheduler;
pub mod sink;
mod store;
mod thread;
pub mod types;

pub use cadence_core::config::SchedulerConfig;
pub use cadence_hooks::{CustomHooks, HookBundle, HookError, HookStage, ThreadHooks, ThreadInfo};
pub use error::{Result, SchedulerError};
pub use scheduler::PeriodicScheduler;
pub use sink::{DiagnosticSink, TracingSink};
pub use types::{JobAction, JobFailure, TaskInfo};
