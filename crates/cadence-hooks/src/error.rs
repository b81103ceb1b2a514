use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    /// `pthread_sigmask` refused to change the worker's signal mask.
    #[error("Unable to set thread sigmask: {0}")]
    SignalMask(#[source] std::io::Error),

    /// The OS rejected the requested thread name.
    #[error("Unable to set thread name {name:?}: {source}")]
    ThreadName {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The name contains an interior NUL byte and cannot be passed to the OS.
    #[error("Invalid thread name {0:?}")]
    InvalidName(String),

    /// A hook panicked; the payload message is kept when it is a string.
    #[error("Hook panicked: {0}")]
    Panicked(String),

    /// Failure reported by a user-supplied hook.
    #[error("Hook failed: {0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, HookError>;
