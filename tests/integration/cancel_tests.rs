use dupfu::pipeline::{CancelToken, DuplicateFinder, FinderError, ScanConfig, ScanOutcome};
use dupfu::signal::ShutdownHandler;
use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn many_files(count: usize) -> TempDir {
    let dir = tempdir().unwrap();
    for i in 0..count {
        let sub = dir.path().join(format!("d{}", i % 10));
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(format!("{i}.bin")), vec![(i % 7) as u8; 4096]).unwrap();
    }
    dir
}

/// Run `f` on a thread and fail if it does not finish in time.
fn within<T: Send + 'static>(timeout: Duration, f: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout).expect("scan did not stop in time")
}

fn assert_stopped(result: Result<ScanOutcome, FinderError>) {
    match result {
        Err(FinderError::Interrupted) => {}
        // The scan may win the race on a fast machine.
        Ok(outcome) => assert!(outcome.stats.scan_complete),
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cancel_running_scan_does_not_deadlock() {
    let dir = many_files(400);
    let root = dir.path().to_path_buf();

    let result = within(Duration::from_secs(30), move || {
        let config = ScanConfig::default()
            .with_workers(2)
            .with_queue_capacities(1, 1)
            .with_read_buffer_size(4096);
        let handle = DuplicateFinder::new(config).start(&root).unwrap();
        handle.cancel();
        handle.wait()
    });

    assert_stopped(result);
}

#[test]
fn test_cancel_from_another_thread() {
    let dir = many_files(400);
    let root = dir.path().to_path_buf();
    let token = CancelToken::new();
    let remote = token.clone();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        remote.cancel();
    });
    let result = within(Duration::from_secs(30), move || {
        DuplicateFinder::new(ScanConfig::default().with_queue_capacities(1, 1))
            .with_cancel_token(token)
            .scan(&root)
    });
    canceller.join().unwrap();

    assert_stopped(result);
}

#[test]
fn test_cancelled_scan_is_never_complete() {
    let dir = many_files(50);
    let token = CancelToken::new();
    token.cancel();

    let handle = DuplicateFinder::new(ScanConfig::default())
        .with_cancel_token(token)
        .start(dir.path())
        .unwrap();
    let snapshot_before = handle.snapshot();
    let result = handle.wait();

    assert!(!snapshot_before.scan_complete);
    assert!(matches!(result, Err(FinderError::Interrupted)));
}

#[test]
fn test_shutdown_handler_cancels_watched_scan() {
    let dir = many_files(400);
    let root = dir.path().to_path_buf();
    let handler = ShutdownHandler::new();
    let token = handler.scan_token();

    handler.request_shutdown();
    assert!(token.is_cancelled());

    let result = within(Duration::from_secs(30), move || {
        DuplicateFinder::new(ScanConfig::default())
            .with_cancel_token(token)
            .scan(&root)
    });
    assert!(matches!(result, Err(FinderError::Interrupted)));
}
