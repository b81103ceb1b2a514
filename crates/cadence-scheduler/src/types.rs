use std::time::{Duration, Instant};

/// The stored callable of a task. Infallible actions are wrapped to return `Ok(())`.
pub type JobAction = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// Why a single execution of a task failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// The action returned an error.
    Errored(String),
    /// The action panicked; the payload message is kept when it is a string.
    Panicked(String),
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobFailure::Errored(message) => write!(f, "returned an error: {message}"),
            JobFailure::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

/// Read-only snapshot of a live task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    pub period: Duration,
    /// Reset to 0 on every successful run.
    pub consecutive_failures: u32,
    /// Zero when the task is already due.
    pub next_run_in: Duration,
}

/// One registered periodic action plus its scheduling state.
pub(crate) struct Job {
    /// Store-unique id; names are not required to be unique.
    pub id: u64,
    pub name: String,
    pub period: Duration,
    pub next_run: Instant,
    /// Taken out by the worker while the action executes.
    pub action: Option<JobAction>,
    pub consecutive_failures: u32,
    pub removed: bool,
}

impl Job {
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_run <= now
    }

    /// Fold one execution outcome into the failure counter.
    pub fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }

    /// Evictable when logically deleted or failing beyond the retry limit.
    pub fn is_purgeable(&self, retry_limit: u32) -> bool {
        self.removed || self.consecutive_failures > retry_limit
    }

    pub fn info(&self, now: Instant) -> TaskInfo {
        TaskInfo {
            name: self.name.clone(),
            period: self.period,
            consecutive_failures: self.consecutive_failures,
            next_run_in: self.next_run.saturating_duration_since(now),
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("period", &self.period)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("removed", &self.removed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(failures: u32, removed: bool) -> Job {
        Job {
            id: 1,
            name: "flush".to_string(),
            period: Duration::from_millis(100),
            next_run: Instant::now(),
            action: None,
            consecutive_failures: failures,
            removed,
        }
    }

    #[test]
    fn success_resets_the_failure_counter() {
        let mut j = job(2, false);
        j.record(true);
        assert_eq!(j.consecutive_failures, 0);
        j.record(false);
        j.record(false);
        assert_eq!(j.consecutive_failures, 2);
    }

    #[test]
    fn purge_threshold_is_strictly_above_retry_limit() {
        assert!(!job(2, false).is_purgeable(2));
        assert!(job(3, false).is_purgeable(2));
        assert!(job(0, true).is_purgeable(2));
    }

    #[test]
    fn failure_display_names_the_kind() {
        assert_eq!(
            JobFailure::Errored("disk full".into()).to_string(),
            "returned an error: disk full"
        );
        assert_eq!(JobFailure::Panicked("boom".into()).to_string(), "panicked: boom");
    }
}
