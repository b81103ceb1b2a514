//! `cadence-core`: configuration and error types shared by the cadence crates.

pub mod config;
pub mod error;

pub use config::{CadenceConfig, HookBundle, SchedulerConfig};
pub use error::{CadenceError, Result};
