use std::panic::{catch_unwind, AssertUnwindSafe};

use cadence_core::config::HookBundle;
use tracing::debug;

use crate::error::{HookError, Result};
use crate::platform;
use crate::types::{HookStage, ThreadHooks, ThreadInfo};

/// Dispatch for the three hook stages.
///
/// Bundles call straight into [`platform`]; custom hooks call their stored
/// callables. A panicking hook is caught and surfaced as
/// [`HookError::Panicked`] so it can never take the worker thread down.
impl ThreadHooks {
    /// Run on the worker thread before the scheduling loop starts.
    pub fn pre_start(&self) -> Result<()> {
        match self {
            ThreadHooks::Bundle(bundle) if bundle.blocks_signals() => platform::block_signals(),
            ThreadHooks::Bundle(_) => Ok(()),
            ThreadHooks::Custom(custom) => match &custom.pre_start {
                Some(f) => guarded(HookStage::PreStart, || f()),
                None => Ok(()),
            },
        }
    }

    /// Run on the spawning thread right after the worker was created.
    pub fn started(&self, info: &ThreadInfo) -> Result<()> {
        match self {
            ThreadHooks::Bundle(bundle) if bundle.names_thread() => platform::name_thread(info),
            ThreadHooks::Bundle(_) => Ok(()),
            ThreadHooks::Custom(custom) => match &custom.started {
                Some(f) => guarded(HookStage::Started, || f(info)),
                None => Ok(()),
            },
        }
    }

    /// Run on the worker thread just before its entry function returns.
    pub fn post_start(&self) -> Result<()> {
        match self {
            ThreadHooks::Bundle(bundle) if bundle.blocks_signals() => platform::restore_signals(),
            ThreadHooks::Bundle(_) => Ok(()),
            ThreadHooks::Custom(custom) => match &custom.post_start {
                Some(f) => guarded(HookStage::PostStart, || f()),
                None => Ok(()),
            },
        }
    }

    /// The bundle this set was built from, if it is not custom.
    pub fn bundle(&self) -> Option<HookBundle> {
        match self {
            ThreadHooks::Bundle(bundle) => Some(*bundle),
            ThreadHooks::Custom(_) => None,
        }
    }
}

fn guarded(stage: HookStage, f: impl FnOnce() -> Result<()>) -> Result<()> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            debug!(%stage, %message, "hook panicked");
            Err(HookError::Panicked(message))
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::types::CustomHooks;

    fn info() -> ThreadInfo {
        ThreadInfo {
            name: "cadence".to_string(),
            id: std::thread::current().id(),
            #[cfg(unix)]
            // SAFETY: pthread_self has no preconditions.
            native: unsafe { libc::pthread_self() },
            #[cfg(not(unix))]
            native: (),
        }
    }

    #[test]
    fn none_bundle_does_nothing() {
        let hooks = ThreadHooks::none();
        assert!(hooks.pre_start().is_ok());
        assert!(hooks.started(&info()).is_ok());
        assert!(hooks.post_start().is_ok());
        assert_eq!(hooks.bundle(), Some(HookBundle::None));
    }

    #[test]
    fn custom_hooks_run_in_their_slots() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (c1, c2, c3) = (calls.clone(), calls.clone(), calls.clone());
        let hooks = ThreadHooks::custom(
            CustomHooks::new()
                .with_pre_start(move || {
                    c1.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .with_started(move |info| {
                    assert_eq!(info.name, "cadence");
                    c2.fetch_add(10, Ordering::SeqCst);
                    Ok(())
                })
                .with_post_start(move || {
                    c3.fetch_add(100, Ordering::SeqCst);
                    Ok(())
                }),
        );

        hooks.pre_start().unwrap();
        hooks.started(&info()).unwrap();
        hooks.post_start().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 111);
        assert!(hooks.bundle().is_none());
    }

    #[test]
    fn empty_custom_slots_are_skipped() {
        let hooks = ThreadHooks::custom(CustomHooks::new());
        assert!(hooks.pre_start().is_ok());
        assert!(hooks.started(&info()).is_ok());
        assert!(hooks.post_start().is_ok());
    }

    #[test]
    fn failing_custom_hook_is_returned() {
        let hooks = ThreadHooks::custom(
            CustomHooks::new().with_pre_start(|| Err(HookError::Custom("nope".into()))),
        );
        assert!(matches!(hooks.pre_start(), Err(HookError::Custom(m)) if m == "nope"));
    }

    #[test]
    fn panicking_custom_hook_is_caught() {
        let hooks = ThreadHooks::custom(CustomHooks::new().with_post_start(|| panic!("boom")));
        match hooks.post_start() {
            Err(HookError::Panicked(message)) => assert_eq!(message, "boom"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn block_signals_bundle_brackets_the_thread() {
        std::thread::spawn(|| {
            let hooks = ThreadHooks::from(HookBundle::BlockSignalsOnly);
            hooks.pre_start().unwrap();
            hooks.post_start().unwrap();
        })
        .join()
        .unwrap();
    }
}
