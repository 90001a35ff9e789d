//! # Dependency Registry
//!
//! A registry of named, singleton-like objects for dependency injection.
//!
//! Objects are looked up by name and type. A missing object is created on demand from a
//! constructor registered ahead of time, stored, and handed out as a shared `Arc` from then
//! on. Tests can [`store`] a substitute under the same name before anything asks for it.
//!
//! Every access runs under a [`ThreadingPolicy`]:
//!
//! - [`ThreadingPolicy::ApplicationGlobal`]: one pool shared by all threads, behind a mutex
//! - [`ThreadingPolicy::SingleThread`]: the same shared pool, without waiting on the mutex
//! - [`ThreadingPolicy::ThreadLocal`]: one pool per thread, released when the thread exits
//! - [`ThreadingPolicy::Default`]: whatever the registry is configured with
//!
//! ## Quick Start
//!
//! ```rust
//! use dependency_registry::{dependency, register_type, store_dependency};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Clock {
//!     offset_secs: i64,
//! }
//!
//! register_type::<Clock>();
//!
//! // Built on first use.
//! let clock: Arc<Clock> = dependency!(Clock).unwrap();
//! assert_eq!(clock.offset_secs, 0);
//!
//! // Replaced by a substitute.
//! store_dependency!(Clock, Clock { offset_secs: 60 }).unwrap();
//! assert_eq!(dependency!(Clock).unwrap().offset_secs, 60);
//! ```
//!
//! ## Main Functions
//!
//! The free functions operate on [`DependencyRegistry::instance`] with the default policy:
//!
//! - [`get`] - Retrieve (and lazily construct) a named object as `Arc<T>`
//! - [`store`] - Store a named object, replacing any previous one
//! - [`has`] / [`type_of`] - Inspect without constructing
//! - [`register_type`] - Make a `Default` type constructible on demand
//! - [`set_default_policy`] - Pick the policy used by all of the above
//! - [`shutdown`] - Release every stored object

mod config;
mod factory;
mod macros;
mod policy;
mod pool;
mod registry;
mod registry_error;
mod registry_event;
mod session;
mod type_key;

use std::sync::Arc;

pub use config::{RegistryConfig, POLICY_ENV_VAR};
pub use factory::FactoryTable;
pub use policy::{ParsePolicyError, PoolScope, ThreadingPolicy};
pub use pool::Handle;
pub use registry::{DependencyRegistry, TraceCallback};
pub use registry_error::RegistryError;
pub use registry_event::RegistryEvent;
pub use session::{Session, SessionManager, SessionProvider};
pub use type_key::TypeKey;

/// Retrieves object `name` from the process-wide registry, constructing it if needed.
///
/// # Errors
///
/// See [`DependencyRegistry::object_by_name`].
pub fn get<T: Send + Sync + 'static>(name: &str) -> Result<Arc<T>, RegistryError> {
    DependencyRegistry::instance().get(name, ThreadingPolicy::Default)
}

/// Stores `value` as object `name` in the process-wide registry.
///
/// # Errors
///
/// See [`DependencyRegistry::store_object`].
pub fn store<T: Send + Sync + 'static>(name: &str, value: T) -> Result<(), RegistryError> {
    DependencyRegistry::instance().store(name, value, ThreadingPolicy::Default)
}

/// Stores an `Arc`-wrapped value as object `name` in the process-wide registry.
///
/// # Errors
///
/// See [`DependencyRegistry::store_object`].
pub fn store_arc<T: Send + Sync + 'static>(name: &str, value: Arc<T>) -> Result<(), RegistryError> {
    DependencyRegistry::instance().store_arc(name, value, ThreadingPolicy::Default)
}

/// Whether the process-wide registry holds object `name`.
pub fn has(name: &str) -> bool {
    DependencyRegistry::instance().has_object(name, ThreadingPolicy::Default)
}

/// Declared type of object `name` in the process-wide registry.
pub fn type_of(name: &str) -> Option<TypeKey> {
    DependencyRegistry::instance().object_type(name, ThreadingPolicy::Default)
}

/// Makes `T` constructible on demand in the process-wide registry.
pub fn register_type<T: Default + Send + Sync + 'static>() {
    DependencyRegistry::instance().register_type::<T>();
}

/// Default policy of the process-wide registry.
pub fn default_policy() -> ThreadingPolicy {
    DependencyRegistry::instance().default_policy()
}

/// Sets the default policy of the process-wide registry.
///
/// Not meant to be called while other threads use the registry. See
/// [`DependencyRegistry::set_default_policy`].
pub fn set_default_policy(policy: ThreadingPolicy) {
    DependencyRegistry::instance().set_default_policy(policy);
}

/// Releases every object held by the process-wide registry.
///
/// Hosts call this from their shutdown sequence.
pub fn shutdown() {
    DependencyRegistry::instance().shutdown();
}

/// Sets a tracing callback on the process-wide registry.
pub fn set_trace_callback(callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
    DependencyRegistry::instance().set_trace_callback(callback);
}

/// Clears the tracing callback of the process-wide registry.
pub fn clear_trace_callback() {
    DependencyRegistry::instance().clear_trace_callback();
}
