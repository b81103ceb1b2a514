//! Platform calls behind the built-in hook bundles.
//!
//! Signal masking is per-thread: [`block_signals`] saves the previous mask in
//! a thread-local slot and [`restore_signals`] puts it back, so both must run
//! on the same (worker) thread. Failures are logged here and returned so the
//! caller can forward them to its diagnostic sink.

use tracing::{debug, error};

use crate::error::{HookError, Result};
use crate::types::ThreadInfo;

/// Linux limits thread names to 16 bytes including the trailing NUL.
#[cfg(target_os = "linux")]
const MAX_THREAD_NAME_BYTES: usize = 15;

#[cfg(unix)]
thread_local! {
    static SAVED_MASK: std::cell::Cell<Option<libc::sigset_t>> = const { std::cell::Cell::new(None) };
}

/// Block every signal on the calling thread, remembering the previous mask.
#[cfg(unix)]
pub fn block_signals() -> Result<()> {
    let mut all = std::mem::MaybeUninit::<libc::sigset_t>::uninit();
    let mut previous = std::mem::MaybeUninit::<libc::sigset_t>::uninit();

    // SAFETY: sigfillset initialises `all`; pthread_sigmask reads `all` and
    // writes the current mask into `previous` before returning 0.
    let rc = unsafe {
        libc::sigfillset(all.as_mut_ptr());
        libc::pthread_sigmask(libc::SIG_SETMASK, all.as_ptr(), previous.as_mut_ptr())
    };

    if rc != 0 {
        SAVED_MASK.with(|slot| slot.set(None));
        let err = std::io::Error::from_raw_os_error(rc);
        error!(error = %err, "unable to set thread sigmask");
        return Err(HookError::SignalMask(err));
    }

    // SAFETY: rc == 0 means `previous` was written.
    let previous = unsafe { previous.assume_init() };
    SAVED_MASK.with(|slot| slot.set(Some(previous)));
    debug!("signals blocked on worker thread");
    Ok(())
}

#[cfg(not(unix))]
pub fn block_signals() -> Result<()> {
    Ok(())
}

/// Restore the mask saved by [`block_signals`]. A no-op when blocking never
/// succeeded on this thread.
#[cfg(unix)]
pub fn restore_signals() -> Result<()> {
    let Some(previous) = SAVED_MASK.with(|slot| slot.take()) else {
        return Ok(());
    };

    // SAFETY: `previous` is a fully initialised sigset_t captured earlier.
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, &previous, std::ptr::null_mut()) };
    if rc != 0 {
        let err = std::io::Error::from_raw_os_error(rc);
        error!(error = %err, "unable to restore thread sigmask");
        return Err(HookError::SignalMask(err));
    }
    debug!("signal mask restored on worker thread");
    Ok(())
}

#[cfg(not(unix))]
pub fn restore_signals() -> Result<()> {
    Ok(())
}

/// Set the OS-level name of the thread described by `info`.
#[cfg(target_os = "linux")]
pub fn name_thread(info: &ThreadInfo) -> Result<()> {
    let name = truncate_name(&info.name, MAX_THREAD_NAME_BYTES);
    let c_name =
        std::ffi::CString::new(name).map_err(|_| HookError::InvalidName(info.name.clone()))?;

    // SAFETY: `info.native` identifies a live thread (the spawner still holds
    // its join handle) and `c_name` is NUL-terminated and within the limit.
    let rc = unsafe { libc::pthread_setname_np(info.native as libc::pthread_t, c_name.as_ptr()) };
    if rc != 0 {
        let source = std::io::Error::from_raw_os_error(rc);
        error!(name = %info.name, error = %source, "unable to set thread name");
        return Err(HookError::ThreadName {
            name: info.name.clone(),
            source,
        });
    }
    debug!(name = %info.name, "worker thread named");
    Ok(())
}

/// Other platforms can only name the calling thread, which is not the worker.
#[cfg(not(target_os = "linux"))]
pub fn name_thread(info: &ThreadInfo) -> Result<()> {
    debug!(name = %info.name, "thread naming not supported on this platform");
    Ok(())
}

/// Longest prefix of `name` that fits in `max` bytes without splitting a char.
pub fn truncate_name(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_untouched() {
        assert_eq!(truncate_name("cadence", 15), "cadence");
    }

    #[test]
    fn long_names_are_cut_at_the_limit() {
        assert_eq!(truncate_name("cadence-periodic-worker", 15), "cadence-periodi");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes; cutting at 3 would split it.
        assert_eq!(truncate_name("abé", 3), "ab");
    }

    #[cfg(unix)]
    #[test]
    fn block_then_restore_on_a_fresh_thread() {
        std::thread::spawn(|| {
            block_signals().unwrap();
            assert!(SAVED_MASK.with(|slot| slot.get()).is_some());
            restore_signals().unwrap();
            assert!(SAVED_MASK.with(|slot| slot.get()).is_none());
        })
        .join()
        .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn restore_without_block_is_a_no_op() {
        std::thread::spawn(|| restore_signals().unwrap()).join().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn names_a_spawned_thread() {
        use std::os::unix::thread::JoinHandleExt;

        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let _ = rx.recv();
        });
        let info = ThreadInfo {
            name: "cadence-test-thread-name".to_string(),
            id: handle.thread().id(),
            native: handle.as_pthread_t(),
        };
        assert!(name_thread(&info).is_ok());
        tx.send(()).unwrap();
        handle.join().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn interior_nul_is_rejected() {
        let info = ThreadInfo {
            name: "bad\0name".to_string(),
            id: std::thread::current().id(),
            // SAFETY: pthread_self has no preconditions.
            native: unsafe { libc::pthread_self() },
        };
        assert!(matches!(name_thread(&info), Err(HookError::InvalidName(_))));
    }
}
