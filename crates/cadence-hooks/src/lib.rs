//! `cadence-hooks`: bootstrap hooks run around the scheduler's worker thread.
//!
//! Three optional callbacks bracket the worker's lifetime:
//!
//! | Stage        | Runs on        | Typical use                          |
//! |--------------|----------------|--------------------------------------|
//! | `pre_start`  | worker thread  | block disruptive signals             |
//! | `started`    | spawning thread| set the OS-level thread name         |
//! | `post_start` | worker thread  | restore whatever `pre_start` changed |
//!
//! Hooks are configured as a unit: either one of the fixed [`HookBundle`]s or
//! a [`CustomHooks`] triple of stored callables.

pub mod engine;
pub mod error;
pub mod platform;
pub mod types;

pub use cadence_core::config::HookBundle;
pub use error::{HookError, Result};
pub use types::{CustomHooks, HookStage, NativeHandle, ThreadHooks, ThreadInfo};
