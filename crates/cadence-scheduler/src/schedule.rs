use std::time::{Duration, Instant};

/// Fallback horizon when `from + period` is not representable.
pub const MAX_HORIZON: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Instant of the next execution of a task with `period`, counted from `from`.
pub fn compute_next_run(from: Instant, period: Duration) -> Instant {
    from.checked_add(period)
        .or_else(|| from.checked_add(MAX_HORIZON))
        .unwrap_or(from)
}

/// Running minimum of candidate wake-up instants for one loop pass.
///
/// Starts at `now + ceiling` (the largest registered period) so the worker
/// never sleeps indefinitely, then shrinks to the earliest next run seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeDeadline(Instant);

impl WakeDeadline {
    pub fn new(now: Instant, ceiling: Duration) -> Self {
        Self(compute_next_run(now, ceiling))
    }

    pub fn fold(&mut self, candidate: Instant) {
        if candidate < self.0 {
            self.0 = candidate;
        }
    }

    pub fn instant(&self) -> Instant {
        self.0
    }
}
