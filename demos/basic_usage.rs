//! Basic usage example for dependency-registry.
//!
//! Demonstrates:
//! - Registering constructors so objects are built on first use
//! - Retrieving objects with `get()` (returns `Arc<T>`) and `get_cloned()` (returns `T`)
//! - Picking a threading policy per access
//! - Checking presence with `has()` without constructing anything
//!
//! Run with: `cargo run --example basic_usage`

use dependency_registry::{define_registry, DependencyRegistry, RegistryConfig, ThreadingPolicy};
use std::sync::Arc;
use std::thread;

// Isolated registry sharing one pool across threads
define_registry!(app, ApplicationGlobal);

#[derive(Debug, Clone, PartialEq)]
struct AppConfig {
    name: String,
    version: u32,
    debug_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            name: "MyApp".to_string(),
            version: 1,
            debug_mode: false,
        }
    }
}

#[derive(Debug, Default)]
struct RequestCounter {
    seen: std::sync::atomic::AtomicU64,
}

fn main() {
    println!("=== dependency-registry: Basic Usage ===\n");

    // -------------------------------------------------------------------------
    // 1. Register constructors
    // -------------------------------------------------------------------------
    println!("1. Registering constructors...");

    app::register_type::<AppConfig>();
    app::register_type::<RequestCounter>();

    println!("   Constructible: AppConfig, RequestCounter");
    println!("   has(\"config\") before first use: {}", app::has("config"));

    // -------------------------------------------------------------------------
    // 2. Build on first use
    // -------------------------------------------------------------------------
    println!("\n2. Retrieving objects (built on first use)...");

    let config: Arc<AppConfig> = app::get("config").unwrap();
    println!("   config: {:?}", config);
    println!("   has(\"config\") after first use: {}", app::has("config"));

    // -------------------------------------------------------------------------
    // 3. Same object everywhere
    // -------------------------------------------------------------------------
    println!("\n3. Sharing across threads (ApplicationGlobal)...");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let counter: Arc<RequestCounter> = app::get("counter").unwrap();
                counter
                    .seen
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let counter: Arc<RequestCounter> = app::get("counter").unwrap();
    println!(
        "   counter.seen = {}",
        counter.seen.load(std::sync::atomic::Ordering::SeqCst)
    );

    // -------------------------------------------------------------------------
    // 4. Owned copies
    // -------------------------------------------------------------------------
    println!("\n4. Retrieving an owned clone...");

    let mut local = app::registry()
        .get_cloned::<AppConfig>("config", ThreadingPolicy::Default)
        .unwrap();
    local.debug_mode = true;
    println!("   local copy: {:?}", local);
    println!("   stored copy unchanged: {:?}", app::get::<AppConfig>("config").unwrap());

    // -------------------------------------------------------------------------
    // 5. Thread-local pools
    // -------------------------------------------------------------------------
    println!("\n5. One object per thread (ThreadLocal)...");

    let registry = Arc::new(DependencyRegistry::new(
        RegistryConfig::default().with_default_policy(ThreadingPolicy::ThreadLocal),
    ));
    registry.register_type::<RequestCounter>();

    let main_counter: Arc<RequestCounter> =
        registry.get("counter", ThreadingPolicy::Default).unwrap();

    let worker = Arc::clone(&registry);
    let same = thread::spawn(move || {
        let worker_counter: Arc<RequestCounter> =
            worker.get("counter", ThreadingPolicy::Default).unwrap();
        Arc::as_ptr(&worker_counter) as usize
    })
    .join()
    .unwrap()
        == Arc::as_ptr(&main_counter) as usize;

    println!("   main thread and worker share an object: {}", same);

    // -------------------------------------------------------------------------
    // 6. Missing objects
    // -------------------------------------------------------------------------
    println!("\n6. Asking for something never registered...");

    match app::get::<String>("motd") {
        Ok(_) => println!("   unexpected hit"),
        Err(e) => println!("   error: {}", e),
    }

    // -------------------------------------------------------------------------
    // 7. Shutdown
    // -------------------------------------------------------------------------
    println!("\n7. Releasing everything...");

    app::shutdown();
    println!("   has(\"config\") after shutdown: {}", app::has("config"));

    println!("\n=== Example completed successfully ===");
}
