//! Unit tests for ambient argument types.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gantry_funcspec::FuncError;

use super::*;

#[test]
fn cancel_token_fires_once_cancelled() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled());
    token.check().expect("not yet cancelled");

    token.cancel();
    assert!(token.is_cancelled());
    assert!(matches!(token.check(), Err(FuncError::Cancelled)));
}

#[test]
fn child_token_observes_parent_cancellation() {
    let parent = CancelToken::new();
    let child = parent.child();
    assert!(!child.is_cancelled());

    parent.cancel();
    assert!(child.is_cancelled());
    // The other direction does not propagate.
    let parent2 = CancelToken::new();
    let child2 = parent2.child();
    child2.cancel();
    assert!(!parent2.is_cancelled());
}

#[test]
fn deadline_token_expires() {
    let token = CancelToken::new().with_deadline(Instant::now() - Duration::from_millis(1));
    assert!(token.is_cancelled());

    let future = CancelToken::new().with_deadline(Instant::now() + Duration::from_secs(3600));
    assert!(!future.is_cancelled());
}

#[test]
fn cleanup_runs_in_reverse_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let cleanup = Cleanup::new();
    for label in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        cleanup.defer(move || order.lock().expect("lock").push(label));
    }

    cleanup.close();
    assert_eq!(
        *order.lock().expect("lock"),
        vec!["third", "second", "first"]
    );

    // Closing again is a no-op.
    cleanup.close();
    assert_eq!(order.lock().expect("lock").len(), 3);
}

#[test]
fn cleanup_actions_registered_once_run_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let cleanup = Cleanup::new();
    let counter = Arc::clone(&runs);
    cleanup.defer(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    cleanup.close();
    cleanup.close();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn data_dir_creates_cache_and_data() {
    let root = tempfile::tempdir().expect("tempdir");
    let dirs = DataDir::from_root(root.path()).expect("datadir");
    assert!(dirs.cache_dir().is_dir());
    assert!(dirs.data_dir().is_dir());
    assert_ne!(dirs.cache_dir(), dirs.data_dir());
}

#[test]
fn logger_names_compose() {
    let logger = Logger::new("docker");
    let child = logger.named("deploy");
    assert_eq!(child.name(), "docker.deploy");
    // Smoke: emitting must not panic without a subscriber.
    child.debug("starting");
    child.info("done");
}
