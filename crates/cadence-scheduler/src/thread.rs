use std::sync::Arc;
use std::thread::JoinHandle;

use cadence_hooks::{HookStage, NativeHandle, ThreadHooks, ThreadInfo};

use crate::sink::DiagnosticSink;

/// Spawn a named thread running `entry`, bracketed by the hooks.
///
/// `pre_start` and `post_start` run on the new thread around `entry`;
/// `started` runs here, once the thread exists, with its id and native
/// handle. Hook failures go to `sink` and never stop the thread.
pub(crate) fn create_thread<F>(
    name: &str,
    hooks: ThreadHooks,
    sink: Arc<dyn DiagnosticSink>,
    entry: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let worker_hooks = hooks.clone();
    let worker_sink = Arc::clone(&sink);
    // std panics on interior NULs in thread names.
    let os_name = name.replace('\0', "");

    let handle = std::thread::Builder::new().name(os_name).spawn(move || {
        if let Err(e) = worker_hooks.pre_start() {
            worker_sink.hook_failed(HookStage::PreStart, &e);
        }
        entry();
        if let Err(e) = worker_hooks.post_start() {
            worker_sink.hook_failed(HookStage::PostStart, &e);
        }
    })?;

    let info = ThreadInfo {
        name: name.to_string(),
        id: handle.thread().id(),
        native: native_handle(&handle),
    };
    if let Err(e) = hooks.started(&info) {
        sink.hook_failed(HookStage::Started, &e);
    }
    Ok(handle)
}

#[cfg(unix)]
fn native_handle(handle: &JoinHandle<()>) -> NativeHandle {
    use std::os::unix::thread::JoinHandleExt;
    handle.as_pthread_t()
}

#[cfg(not(unix))]
fn native_handle(_handle: &JoinHandle<()>) -> NativeHandle {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cadence_hooks::{CustomHooks, HookError};
    use parking_lot::Mutex;

    use super::*;
    use crate::types::JobFailure;

    #[derive(Default)]
    struct RecordingSink {
        hooks: Mutex<Vec<HookStage>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn job_failed(&self, _job: &str, _failure: &JobFailure) {}

        fn hook_failed(&self, stage: HookStage, _error: &HookError) {
            self.hooks.lock().push(stage);
        }
    }

    #[test]
    fn hooks_bracket_the_entry_function() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (pre, post, body) = (order.clone(), order.clone(), order.clone());
        let started_name = Arc::new(Mutex::new(None));
        let seen = started_name.clone();

        let hooks = ThreadHooks::custom(
            CustomHooks::new()
                .with_pre_start(move || {
                    pre.lock().push("pre");
                    Ok(())
                })
                .with_started(move |info| {
                    *seen.lock() = Some(info.name.clone());
                    Ok(())
                })
                .with_post_start(move || {
                    post.lock().push("post");
                    Ok(())
                }),
        );

        let sink = Arc::new(RecordingSink::default());
        let handle = create_thread("cadence-test", hooks, sink, move || {
            assert_eq!(std::thread::current().name(), Some("cadence-test"));
            body.lock().push("entry");
        })
        .unwrap();
        handle.join().unwrap();

        assert_eq!(*order.lock(), ["pre", "entry", "post"]);
        assert_eq!(started_name.lock().as_deref(), Some("cadence-test"));
    }

    #[test]
    fn hook_failures_are_reported_not_fatal() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let sink = Arc::new(RecordingSink::default());
        let hooks = ThreadHooks::custom(
            CustomHooks::new()
                .with_pre_start(|| Err(HookError::Custom("no mask".into())))
                .with_started(|_| Err(HookError::Custom("no name".into())))
                .with_post_start(|| panic!("restore blew up")),
        );

        let handle = create_thread("cadence", hooks, sink.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        handle.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        let mut stages = sink.hooks.lock().clone();
        stages.sort_by_key(|stage| stage.to_string());
        assert_eq!(stages, [HookStage::PostStart, HookStage::PreStart, HookStage::Started]);
    }
}
