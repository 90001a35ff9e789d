//! Integration tests for pool selection across threads.
//!
//! Each test builds its own registry, so they can run in parallel.

use dependency_registry::{DependencyRegistry, RegistryConfig, RegistryError, ThreadingPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn registry(policy: ThreadingPolicy) -> Arc<DependencyRegistry> {
    Arc::new(DependencyRegistry::new(
        RegistryConfig::default().with_default_policy(policy),
    ))
}

#[derive(Debug, Default)]
struct Connection {
    id: usize,
}

#[test]
fn test_thread_local_pools_are_isolated() {
    let registry = registry(ThreadingPolicy::ThreadLocal);

    registry
        .store("conn", Connection { id: 1 }, ThreadingPolicy::ThreadLocal)
        .unwrap();

    let other = Arc::clone(&registry);
    let seen_elsewhere = thread::spawn(move || {
        other.object_by_name("conn", None, ThreadingPolicy::ThreadLocal)
    })
    .join()
    .unwrap();

    assert_eq!(
        seen_elsewhere.unwrap_err(),
        RegistryError::NotFound {
            name: "conn".to_string()
        }
    );

    // Still there for the thread that stored it.
    let conn: Arc<Connection> = registry.get("conn", ThreadingPolicy::ThreadLocal).unwrap();
    assert_eq!(conn.id, 1);
}

#[test]
fn test_thread_local_construction_per_thread() {
    let registry = registry(ThreadingPolicy::ThreadLocal);
    let built = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&built);
    registry.register_constructor(move || Connection {
        id: counter.fetch_add(1, Ordering::SeqCst),
    });

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let first: Arc<Connection> = registry.get("conn", ThreadingPolicy::Default).unwrap();
                let second: Arc<Connection> =
                    registry.get("conn", ThreadingPolicy::Default).unwrap();
                assert!(Arc::ptr_eq(&first, &second));
                first.id
            })
        })
        .collect();

    let mut ids: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();

    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(built.load(Ordering::SeqCst), 4);
}

#[test]
fn test_application_global_is_shared() {
    let registry = registry(ThreadingPolicy::ApplicationGlobal);

    let stored = Arc::new(Connection { id: 7 });
    registry
        .store_arc("conn", Arc::clone(&stored), ThreadingPolicy::ApplicationGlobal)
        .unwrap();

    let other = Arc::clone(&registry);
    let seen = thread::spawn(move || {
        other
            .get::<Connection>("conn", ThreadingPolicy::ApplicationGlobal)
            .unwrap()
    })
    .join()
    .unwrap();

    assert!(Arc::ptr_eq(&stored, &seen));
}

#[test]
fn test_concurrent_lazy_construction_happens_once() {
    const THREADS: usize = 16;

    let registry = registry(ThreadingPolicy::ApplicationGlobal);
    let built = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&built);
    registry.register_constructor(move || {
        // Widen the window in which a second constructor could sneak in.
        thread::yield_now();
        Connection {
            id: counter.fetch_add(1, Ordering::SeqCst),
        }
    });

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry
                    .get::<Connection>("conn", ThreadingPolicy::ApplicationGlobal)
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<Arc<Connection>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|conn| Arc::ptr_eq(conn, &results[0])));
}

#[test]
fn test_single_thread_uses_the_global_pool() {
    let registry = registry(ThreadingPolicy::SingleThread);
    registry.register_type::<Connection>();

    let conn: Arc<Connection> = registry.get("conn", ThreadingPolicy::Default).unwrap();

    // The same pool is visible through the locked discipline, from any thread.
    let other = Arc::clone(&registry);
    let seen = thread::spawn(move || {
        other
            .get::<Connection>("conn", ThreadingPolicy::ApplicationGlobal)
            .unwrap()
    })
    .join()
    .unwrap();

    assert!(Arc::ptr_eq(&conn, &seen));
    assert_eq!(registry.global_object_count(), 1);
}

#[test]
fn test_default_policy_applies_to_default_requests_only() {
    let registry = registry(ThreadingPolicy::ThreadLocal);

    registry.store("a", 1u8, ThreadingPolicy::Default).unwrap();
    registry.set_default_policy(ThreadingPolicy::ApplicationGlobal);
    registry.store("b", 2u8, ThreadingPolicy::Default).unwrap();

    assert!(registry.has_object("a", ThreadingPolicy::ThreadLocal));
    assert!(!registry.has_object("a", ThreadingPolicy::Default));
    assert!(registry.has_object("b", ThreadingPolicy::ApplicationGlobal));
    assert!(!registry.has_object("b", ThreadingPolicy::ThreadLocal));
}

#[test]
fn test_same_name_in_different_pools() {
    let registry = registry(ThreadingPolicy::ThreadLocal);

    registry
        .store("port", 80u16, ThreadingPolicy::ApplicationGlobal)
        .unwrap();
    registry
        .store("port", "eighty".to_string(), ThreadingPolicy::ThreadLocal)
        .unwrap();

    assert_eq!(
        *registry
            .get::<u16>("port", ThreadingPolicy::ApplicationGlobal)
            .unwrap(),
        80
    );
    assert_eq!(
        *registry
            .get::<String>("port", ThreadingPolicy::ThreadLocal)
            .unwrap(),
        "eighty"
    );
}
