//! Test injection example for dependency-registry.
//!
//! Demonstrates:
//! - Storing a substitute before anything asks for the real object
//! - Naming dependencies after their type with `dependency!` / `store_dependency!`
//! - Replacing a stored object while old `Arc` handles stay valid
//! - Tracing registry activity
//!
//! Run with: `cargo run --example test_injection`

use dependency_registry::{
    dependency, store_dependency, DependencyRegistry, RegistryConfig, SessionManager,
    SessionProvider, ThreadingPolicy,
};
use std::sync::Arc;

trait Mailer: Send + Sync {
    fn send(&self, to: &str, body: &str) -> String;
}

struct SmtpMailer {
    host: String,
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, body: &str) -> String {
        format!("[smtp://{}] {to}: {body}", self.host)
    }
}

struct RecordingMailer;

impl Mailer for RecordingMailer {
    fn send(&self, to: &str, body: &str) -> String {
        format!("[recorded] {to}: {body}")
    }
}

/// The registry stores sized values, so the trait object lives behind a wrapper.
struct MailService(Box<dyn Mailer>);

/// Code under test: pulls its collaborators from the registry by type name.
fn welcome(registry: &DependencyRegistry, session_id: &[u8]) -> String {
    let sessions = dependency!(SessionManager, registry).unwrap();
    let mail = dependency!(MailService, registry).unwrap();

    let session = sessions.get(session_id);
    let user = session.value("user").unwrap_or_else(|| "guest".to_string());
    mail.0.send(&user, "welcome aboard")
}

fn main() {
    println!("=== dependency-registry: Test Injection ===\n");

    let registry = DependencyRegistry::new(
        RegistryConfig::default().with_default_policy(ThreadingPolicy::ApplicationGlobal),
    );
    registry.register_type::<SessionManager>();
    registry.register_constructor(|| {
        MailService(Box::new(SmtpMailer {
            host: "mail.example.com".to_string(),
        }))
    });

    registry.set_trace_callback(|event| println!("   [trace] {event}"));

    // -------------------------------------------------------------------------
    // 1. Inject a substitute before first use
    // -------------------------------------------------------------------------
    println!("1. Storing a recording mailer before anything asks for one...");

    store_dependency!(MailService, MailService(Box::new(RecordingMailer)), registry).unwrap();

    // -------------------------------------------------------------------------
    // 2. Run the code under test
    // -------------------------------------------------------------------------
    println!("\n2. Running code that depends on SessionManager and MailService...");

    let sessions = dependency!(SessionManager, registry).unwrap();
    sessions.get(b"abc").set_value("user", "ada@example.com");

    println!("   result: {}", welcome(&registry, b"abc"));

    // -------------------------------------------------------------------------
    // 3. Replace while a handle is held
    // -------------------------------------------------------------------------
    println!("\n3. Replacing the mailer while a handle is still held...");

    let held = dependency!(MailService, registry).unwrap();
    registry.clear_trace_callback();

    store_dependency!(
        MailService,
        MailService(Box::new(SmtpMailer {
            host: "staging.example.com".to_string(),
        })),
        registry
    )
    .unwrap();

    let current = dependency!(MailService, registry).unwrap();
    println!("   held:    {}", held.0.send("bob", "hi"));
    println!("   current: {}", current.0.send("bob", "hi"));
    println!("   same Arc? {}", Arc::ptr_eq(&held, &current));

    // -------------------------------------------------------------------------
    // 4. Start over
    // -------------------------------------------------------------------------
    println!("\n4. Shutting down and letting the real constructor run...");

    registry.shutdown();
    println!("   result: {}", welcome(&registry, b"abc"));

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------
    println!("\n=== Example Complete ===");
    println!("Key takeaways:");
    println!("  - A stored object always wins over the registered constructor");
    println!("  - Existing Arc<T> handles survive replacement and shutdown");
    println!("  - Shutdown empties the pools; constructors stay registered");
}
