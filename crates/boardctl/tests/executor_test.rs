//! Integration tests for the command executor.
//!
//! These exercise the full lock → port → worker → cleanup path with the
//! real file lock and scripted ports.

use boardctl::scripted::{PortEvent, Script, ScriptedPortFactory};
use boardctl::{BoardError, CommandExecutor, FileLock, InProcessLock};
use serial_test::serial;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Helper to build an executor over a file lock in a temporary directory.
fn file_locked_executor(dir: &TempDir, factory: &ScriptedPortFactory) -> (CommandExecutor, FileLock) {
    let lock = FileLock::new(dir.path().join("boardctl.lock"));
    let executor = CommandExecutor::new(Arc::new(lock.clone()), Arc::new(factory.clone()));
    (executor, lock)
}

// ============================================================================
// Lock Lifecycle Tests
// ============================================================================

#[test]
fn test_lock_file_removed_after_success() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedPortFactory::new();
    factory.push(Script::respond("bri_read", "BRI: 77"));
    let (executor, lock) = file_locked_executor(&dir, &factory);

    let body = executor.execute("bri_read").expect("Exchange should succeed");

    assert_eq!(body, "BRI: 77");
    assert!(!lock.path().exists(), "Lock file must be removed after the call");
    assert_eq!(factory.open_ports(), 0);
}

#[test]
fn test_lock_file_removed_after_every_failure() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedPortFactory::new();
    factory.push(Script::FailOpen);
    factory.push(Script::FailWrite);
    factory.push(Script::Silent);
    let (executor, lock) = file_locked_executor(&dir, &factory);
    let executor = executor.with_timeout(Duration::from_millis(100));

    let err = executor.execute("temp_read").unwrap_err();
    assert!(matches!(err, BoardError::Port { .. }), "got {err:?}");
    assert!(!lock.path().exists());

    let err = executor.execute("temp_read").unwrap_err();
    assert!(matches!(err, BoardError::Write { .. }), "got {err:?}");
    assert!(!lock.path().exists());

    let err = executor.execute("temp_read").unwrap_err();
    assert!(matches!(err, BoardError::Timeout { .. }), "got {err:?}");
    assert!(!lock.path().exists());

    assert_eq!(factory.open_ports(), 0);
    assert_eq!(factory.closes(), 2);
}

#[test]
fn test_lock_failure_opens_no_port() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedPortFactory::new();
    factory.push(Script::respond("bri_read", "BRI: 77"));

    let lock = FileLock::new(dir.path().join("no-such-dir").join("boardctl.lock"));
    let executor = CommandExecutor::new(Arc::new(lock), Arc::new(factory.clone()));

    let err = executor.execute("bri_read").unwrap_err();

    assert!(err.is_lock_error(), "got {err:?}");
    assert_eq!(factory.opens(), 0);
    assert_eq!(factory.remaining_scripts(), 1);
}

#[test]
fn test_bounded_lock_wait() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("boardctl.lock");
    let factory = ScriptedPortFactory::new();
    factory.push(Script::Silent);

    // The first caller holds the lock until its exchange times out.
    let holder = CommandExecutor::new(Arc::new(FileLock::new(&path)), Arc::new(factory.clone()))
        .with_timeout(Duration::from_millis(600));
    let waiter = CommandExecutor::new(
        Arc::new(FileLock::new(&path).with_wait_timeout(Some(Duration::from_millis(100)))),
        Arc::new(factory.clone()),
    );

    let handle = thread::spawn(move || holder.execute("temp_read"));
    while factory.opens() == 0 {
        thread::sleep(Duration::from_millis(5));
    }

    let err = waiter.execute("bri_read").unwrap_err();
    assert!(matches!(err, BoardError::LockTimeout { .. }), "got {err:?}");

    assert!(matches!(handle.join().unwrap(), Err(BoardError::Timeout { .. })));
    assert_eq!(factory.opens(), 1);
    assert!(!path.exists());
}

// ============================================================================
// Timeout Tests
// ============================================================================

#[test]
#[serial]
fn test_timeout_respects_deadline() {
    let factory = ScriptedPortFactory::new();
    factory.push(Script::Silent);
    let lock = InProcessLock::new("board");
    let deadline = Duration::from_millis(300);
    let executor = CommandExecutor::new(Arc::new(lock.clone()), Arc::new(factory.clone()))
        .with_timeout(deadline);

    let started = Instant::now();
    let err = executor.execute("temp_read").unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, BoardError::Timeout { ref command, .. } if command == "temp_read"));
    assert!(elapsed >= deadline, "Returned before the deadline: {elapsed:?}");
    assert!(
        elapsed < deadline + Duration::from_millis(500),
        "Returned too long after the deadline: {elapsed:?}"
    );
    assert!(!lock.is_held());
    assert_eq!(factory.reads_after_close(), 0);
}

#[test]
#[serial]
fn test_partial_reply_still_times_out() {
    let factory = ScriptedPortFactory::new();
    // Output arrives but the prompt never does.
    factory.push(Script::reply("temp_read\nTMP: 235\nHUM: 412\n"));
    let executor = CommandExecutor::new(
        Arc::new(InProcessLock::new("board")),
        Arc::new(factory.clone()),
    )
    .with_timeout(Duration::from_millis(200));

    let err = executor.execute("temp_read").unwrap_err();
    assert!(matches!(err, BoardError::Timeout { .. }));
}

// ============================================================================
// Serialization Tests
// ============================================================================

/// Check that every opened port is written and closed before the next opens.
fn assert_not_interleaved(events: &[PortEvent]) {
    let mut current: Option<usize> = None;
    for event in events {
        match (event, current) {
            (PortEvent::Open(id), None) => current = Some(*id),
            (PortEvent::Write(id, _), Some(open)) => assert_eq!(*id, open, "events: {events:?}"),
            (PortEvent::Close(id), Some(open)) => {
                assert_eq!(*id, open, "events: {events:?}");
                current = None;
            }
            _ => panic!("interleaved exchange: {events:?}"),
        }
    }
    assert!(current.is_none());
}

#[test]
#[serial]
fn test_concurrent_executions_are_serialized_by_file_lock() {
    let dir = TempDir::new().unwrap();
    let factory = ScriptedPortFactory::new();
    for _ in 0..8 {
        factory.push(Script::respond("bri_read", "BRI: 77"));
    }
    let (executor, lock) = file_locked_executor(&dir, &factory);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let executor = executor.clone();
            thread::spawn(move || executor.execute("bri_read"))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), "BRI: 77");
    }

    assert_eq!(factory.opens(), 8);
    assert_eq!(factory.max_open_ports(), 1);
    assert_not_interleaved(&factory.events());
    assert!(!lock.path().exists());
}

#[test]
#[serial]
fn test_second_caller_waits_for_first_release() {
    let factory = ScriptedPortFactory::new();
    factory.push(Script::Silent);
    factory.push(Script::respond("bri_read", "BRI: 77"));
    let lock = InProcessLock::new("board");

    let first = CommandExecutor::new(Arc::new(lock.clone()), Arc::new(factory.clone()))
        .with_timeout(Duration::from_millis(300));
    let second = first.clone().with_timeout(Duration::from_secs(5));

    let first_handle = thread::spawn(move || first.execute("temp_read"));
    while factory.opens() == 0 {
        thread::sleep(Duration::from_millis(5));
    }

    let body = second.execute("bri_read").unwrap();
    let first_result = first_handle.join().unwrap();

    assert!(matches!(first_result, Err(BoardError::Timeout { .. })));
    assert_eq!(body, "BRI: 77");
    assert_eq!(lock.acquisitions(), 2);
    assert_eq!(
        factory.events(),
        vec![
            PortEvent::Open(0),
            PortEvent::Write(0, b"temp_read\n".to_vec()),
            PortEvent::Close(0),
            PortEvent::Open(1),
            PortEvent::Write(1, b"bri_read\n".to_vec()),
            PortEvent::Close(1),
        ]
    );
}
