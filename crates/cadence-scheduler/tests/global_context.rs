// The process-wide scheduler lives in a static, so these checks share one
// test binary (and one process) and run in sequence inside a single test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use cadence_scheduler::context::{global, init_global, shutdown_global};
use cadence_scheduler::{HookBundle, SchedulerConfig, SchedulerError};

#[test]
fn global_scheduler_lifecycle() {
    // Teardown before first use is a no-op.
    shutdown_global();

    let config = SchedulerConfig {
        retry_limit: 4,
        hooks: HookBundle::None,
        ..SchedulerConfig::default()
    };
    let first = init_global(config.clone()).unwrap();
    assert_eq!(first.config().retry_limit, 4);

    // Every thread sees the same instance.
    let addresses: Vec<usize> = (0..4)
        .map(|_| std::thread::spawn(|| global() as *const _ as usize))
        .map(|h| h.join().unwrap())
        .collect();
    assert!(addresses.iter().all(|&a| a == first as *const _ as usize));

    assert!(matches!(
        init_global(config),
        Err(SchedulerError::AlreadyInitialized)
    ));

    let ticks = Arc::new(AtomicUsize::new(0));
    let t = ticks.clone();
    global()
        .add_periodic_task(
            "global-tick",
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(20),
        )
        .unwrap();
    sleep(Duration::from_millis(120));
    assert!(ticks.load(Ordering::SeqCst) >= 1);

    shutdown_global();
    assert!(!global().has_periodic_task("global-tick"));
    assert!(!global().is_worker_running());
    let after = ticks.load(Ordering::SeqCst);
    sleep(Duration::from_millis(60));
    assert_eq!(ticks.load(Ordering::SeqCst), after);
}
