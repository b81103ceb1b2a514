use cadence_hooks::{HookError, HookStage};
use tracing::{error, warn};

use crate::types::JobFailure;

/// Receives failure reports from the scheduler.
///
/// Called on the worker thread (job and pre/post-start failures) or on the
/// thread that triggered a spawn (started-hook failures). Implementations
/// must not panic and should return quickly; job execution is paused while a
/// report is delivered.
pub trait DiagnosticSink: Send + Sync {
    /// One failed execution of the task named `job`.
    fn job_failed(&self, job: &str, failure: &JobFailure);

    /// A bootstrap hook could not apply its effect. Never fatal.
    fn hook_failed(&self, stage: HookStage, error: &HookError);
}

/// Default sink: forwards every report to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn job_failed(&self, job: &str, failure: &JobFailure) {
        warn!(%job, %failure, "periodic task failed");
    }

    fn hook_failed(&self, stage: HookStage, error: &HookError) {
        error!(%stage, %error, "worker thread hook failed");
    }
}
