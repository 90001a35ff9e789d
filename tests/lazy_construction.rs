//! Integration tests for on-demand construction and substitution.

use dependency_registry::{
    DependencyRegistry, FactoryTable, RegistryConfig, RegistryError, SessionManager,
    SessionProvider, ThreadingPolicy, TypeKey,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Mailer: Send + Sync {
    fn send(&self, to: &str) -> String;
}

struct SmtpMailer;

impl Mailer for SmtpMailer {
    fn send(&self, to: &str) -> String {
        format!("smtp -> {to}")
    }
}

struct FakeMailer;

impl Mailer for FakeMailer {
    fn send(&self, to: &str) -> String {
        format!("fake -> {to}")
    }
}

/// Trait objects are stored behind a sized wrapper type.
struct MailerService(Box<dyn Mailer>);

impl Default for MailerService {
    fn default() -> Self {
        MailerService(Box::new(SmtpMailer))
    }
}

fn registry() -> DependencyRegistry {
    DependencyRegistry::new(
        RegistryConfig::default().with_default_policy(ThreadingPolicy::ApplicationGlobal),
    )
}

#[test]
fn test_idempotent_get_constructs_once() {
    for policy in ThreadingPolicy::CONCRETE {
        let registry = registry();
        let built = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&built);
        registry.register_constructor(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            MailerService::default()
        });

        let first: Arc<MailerService> = registry.get("mailer", policy).unwrap();
        let second: Arc<MailerService> = registry.get("mailer", policy).unwrap();

        assert!(Arc::ptr_eq(&first, &second), "{policy}");
        assert_eq!(built.load(Ordering::SeqCst), 1, "{policy}");
    }
}

#[test]
fn test_stored_substitute_prevents_construction() {
    let registry = registry();
    let built = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&built);
    registry.register_constructor(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        MailerService::default()
    });

    registry
        .store(
            "mailer",
            MailerService(Box::new(FakeMailer)),
            ThreadingPolicy::Default,
        )
        .unwrap();

    let mailer: Arc<MailerService> = registry.get("mailer", ThreadingPolicy::Default).unwrap();
    assert_eq!(mailer.0.send("bob"), "fake -> bob");
    assert_eq!(built.load(Ordering::SeqCst), 0);
}

#[test]
fn test_overwrite_returns_latest() {
    let registry = registry();

    registry
        .store("limit", 1usize, ThreadingPolicy::Default)
        .unwrap();
    registry
        .store("limit", 2usize, ThreadingPolicy::Default)
        .unwrap();

    assert_eq!(
        *registry
            .get::<usize>("limit", ThreadingPolicy::Default)
            .unwrap(),
        2
    );
}

#[test]
fn test_overwrite_releases_previous_value() {
    let registry = registry();
    let first = Arc::new(MailerService::default());

    registry
        .store_arc("mailer", Arc::clone(&first), ThreadingPolicy::Default)
        .unwrap();
    assert_eq!(Arc::strong_count(&first), 2);

    registry
        .store("mailer", MailerService(Box::new(FakeMailer)), ThreadingPolicy::Default)
        .unwrap();
    assert_eq!(Arc::strong_count(&first), 1);
}

#[test]
fn test_type_safety() {
    let registry = registry();
    registry
        .store("mailer", MailerService::default(), ThreadingPolicy::Default)
        .unwrap();

    let err = registry
        .get::<SessionManager>("mailer", ThreadingPolicy::Default)
        .unwrap_err();

    assert!(err.is_type_mismatch());
    assert_eq!(
        err.to_string(),
        format!(
            "object `mailer` is stored as `{}`, not `{}`",
            std::any::type_name::<MailerService>(),
            std::any::type_name::<SessionManager>()
        )
    );
}

#[test]
fn test_absence() {
    let registry = registry();

    assert!(registry
        .object_by_name("nothing", None, ThreadingPolicy::Default)
        .unwrap_err()
        .is_not_found());
    assert!(!registry.has_object("nothing", ThreadingPolicy::Default));
    assert_eq!(registry.object_type("nothing", ThreadingPolicy::Default), None);
}

#[test]
fn test_lookup_with_type_key() {
    let registry = registry();
    registry.register_type::<SessionManager>();

    let handle = registry
        .object_by_name(
            "sessions",
            Some(TypeKey::of::<SessionManager>()),
            ThreadingPolicy::Default,
        )
        .unwrap();

    assert!(handle.downcast::<SessionManager>().is_ok());
    assert_eq!(
        registry.object_type("sessions", ThreadingPolicy::Default),
        Some(TypeKey::of::<SessionManager>())
    );
}

#[test]
fn test_has_and_type_of_never_construct() {
    let registry = registry();
    registry.register_type::<SessionManager>();

    assert!(!registry.has_object("sessions", ThreadingPolicy::Default));
    assert_eq!(registry.global_object_count(), 0);
}

#[test]
fn test_declining_constructor_stores_nothing() {
    let registry = registry();
    let allow = Arc::new(AtomicUsize::new(0));

    let gate = Arc::clone(&allow);
    registry.register_fallible(move || (gate.load(Ordering::SeqCst) > 0).then(|| 5u64));

    assert_eq!(
        registry
            .get::<u64>("quota", ThreadingPolicy::Default)
            .unwrap_err(),
        RegistryError::NotFound {
            name: "quota".to_string()
        }
    );
    assert!(!registry.has_object("quota", ThreadingPolicy::Default));

    allow.store(1, Ordering::SeqCst);
    assert_eq!(
        *registry.get::<u64>("quota", ThreadingPolicy::Default).unwrap(),
        5
    );
}

#[test]
fn test_prepared_factory_table() {
    let mut factories = FactoryTable::new();
    factories.register::<SessionManager>();
    factories.register::<MailerService>();

    let registry = registry().with_factories(factories);

    assert!(registry.is_constructible(TypeKey::of::<SessionManager>()));
    assert!(registry.is_constructible(TypeKey::of::<MailerService>()));
    assert!(!registry.is_constructible(TypeKey::of::<u8>()));
}

#[test]
fn test_session_manager_as_dependency() {
    let registry = registry();
    registry.register_type::<SessionManager>();

    let sessions: Arc<SessionManager> =
        registry.get("SessionManager", ThreadingPolicy::Default).unwrap();
    sessions.get(b"client-1").set_value("user", "ada");

    let again: Arc<SessionManager> =
        registry.get("SessionManager", ThreadingPolicy::Default).unwrap();
    assert_eq!(
        again.get(b"client-1").value("user").as_deref(),
        Some("ada")
    );
}
