//! Macros for naming dependencies after their type and for isolated registries.

/// Retrieves the dependency of type `T` stored under the name `stringify!(T)`.
///
/// Expands to a `Result<Arc<T>, RegistryError>` using the default policy. Without a registry
/// argument the process-wide registry is used.
///
/// # Examples
///
/// ```rust
/// use dependency_registry::{dependency, DependencyRegistry, RegistryConfig};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Templates;
///
/// let registry = DependencyRegistry::new(RegistryConfig::default());
/// registry.register_type::<Templates>();
///
/// let templates: Arc<Templates> = dependency!(Templates, registry).unwrap();
/// assert!(registry.has_object("Templates", Default::default()));
/// ```
#[macro_export]
macro_rules! dependency {
    ($ty:ty) => {
        $crate::get::<$ty>(stringify!($ty))
    };
    ($ty:ty, $registry:expr) => {
        ($registry).get::<$ty>(stringify!($ty), $crate::ThreadingPolicy::Default)
    };
}

/// Stores `value` as the dependency of type `T`, under the name `stringify!(T)`.
///
/// The counterpart of [`dependency!`], mostly used to inject test doubles.
///
/// # Examples
///
/// ```rust
/// use dependency_registry::{dependency, store_dependency, DependencyRegistry, RegistryConfig};
///
/// struct Endpoint(&'static str);
///
/// let registry = DependencyRegistry::new(RegistryConfig::default());
/// store_dependency!(Endpoint, Endpoint("http://localhost:9000"), registry).unwrap();
///
/// assert_eq!(dependency!(Endpoint, registry).unwrap().0, "http://localhost:9000");
/// ```
#[macro_export]
macro_rules! store_dependency {
    ($ty:ty, $value:expr) => {
        $crate::store::<$ty>(stringify!($ty), $value)
    };
    ($ty:ty, $value:expr, $registry:expr) => {
        ($registry).store::<$ty>(stringify!($ty), $value, $crate::ThreadingPolicy::Default)
    };
}

/// Creates an isolated registry with a single macro invocation.
///
/// The macro generates a module containing:
/// - a lazily created, module-private `DependencyRegistry`
/// - free functions forwarding to it with the default policy
/// - `registry()`, for everything the free functions do not cover
///
/// An optional second argument names the default [`ThreadingPolicy`](crate::ThreadingPolicy)
/// variant; it defaults to `ThreadLocal`.
///
/// # Examples
///
/// ```rust
/// use dependency_registry::{define_registry, ThreadingPolicy};
/// use std::sync::Arc;
///
/// define_registry!(services, ApplicationGlobal);
///
/// services::store("greeting", "Hello".to_string()).unwrap();
///
/// let msg: Arc<String> = services::get("greeting").unwrap();
/// assert_eq!(&**msg, "Hello");
/// assert_eq!(services::registry().default_policy(), ThreadingPolicy::ApplicationGlobal);
/// ```
///
/// # Multiple Registries
///
/// ```rust
/// use dependency_registry::define_registry;
///
/// define_registry!(database);
/// define_registry!(cache);
///
/// database::store("url", "postgresql://localhost".to_string()).unwrap();
///
/// assert!(database::has("url"));
/// assert!(!cache::has("url"));
/// ```
#[macro_export]
macro_rules! define_registry {
    ($name:ident) => {
        $crate::define_registry!($name, ThreadLocal);
    };
    ($name:ident, $policy:ident) => {
        pub mod $name {
            use std::sync::{Arc, LazyLock};

            static REGISTRY: LazyLock<$crate::DependencyRegistry> = LazyLock::new(|| {
                $crate::DependencyRegistry::new(
                    $crate::RegistryConfig::default()
                        .with_default_policy($crate::ThreadingPolicy::$policy),
                )
            });

            /// The registry behind this module.
            pub fn registry() -> &'static $crate::DependencyRegistry {
                &REGISTRY
            }

            /// Retrieve object `name`, constructing it if needed.
            pub fn get<T: Send + Sync + 'static>(
                name: &str,
            ) -> Result<Arc<T>, $crate::RegistryError> {
                REGISTRY.get(name, $crate::ThreadingPolicy::Default)
            }

            /// Store object `name`, replacing any previous one.
            pub fn store<T: Send + Sync + 'static>(
                name: &str,
                value: T,
            ) -> Result<(), $crate::RegistryError> {
                REGISTRY.store(name, value, $crate::ThreadingPolicy::Default)
            }

            /// Whether object `name` exists.
            pub fn has(name: &str) -> bool {
                REGISTRY.has_object(name, $crate::ThreadingPolicy::Default)
            }

            /// Declared type of object `name`.
            pub fn type_of(name: &str) -> Option<$crate::TypeKey> {
                REGISTRY.object_type(name, $crate::ThreadingPolicy::Default)
            }

            /// Make `T` constructible on demand.
            pub fn register_type<T: Default + Send + Sync + 'static>() {
                REGISTRY.register_type::<T>()
            }

            /// Set a tracing callback for registry operations.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::RegistryEvent) + Send + Sync + 'static,
            ) {
                REGISTRY.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                REGISTRY.clear_trace_callback()
            }

            /// Release every stored object.
            pub fn shutdown() {
                REGISTRY.shutdown()
            }
        }
    };
}
