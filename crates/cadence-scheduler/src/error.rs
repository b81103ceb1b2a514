use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Periods must be positive and representable as a future instant.
    #[error("Invalid period for task {name:?}: {reason}")]
    InvalidPeriod { name: String, reason: String },

    /// The worker thread could not be created.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// `init_global` was called after the process-wide scheduler existed.
    #[error("Global scheduler already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Config(#[from] cadence_core::CadenceError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
