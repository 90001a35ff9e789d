//! The dependency registry: named objects, lazily constructed, stored in a
//! pool chosen by the threading policy of each access.
//!
//! # Examples
//!
//! ```
//! use dependency_registry::{DependencyRegistry, RegistryConfig, ThreadingPolicy};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Mailer {
//!     sent: std::sync::atomic::AtomicUsize,
//! }
//!
//! let registry = DependencyRegistry::new(
//!     RegistryConfig::default().with_default_policy(ThreadingPolicy::ApplicationGlobal),
//! );
//! registry.register_type::<Mailer>();
//!
//! // Created on first request, shared afterwards.
//! let first: Arc<Mailer> = registry.get("Mailer", ThreadingPolicy::Default).unwrap();
//! let second: Arc<Mailer> = registry.get("Mailer", ThreadingPolicy::Default).unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, RwLock, RwLockWriteGuard, TryLockError};

use tracing::{debug, trace, warn};

use crate::factory::FactoryTable;
use crate::pool::{Entry, Handle, Pool, ThreadPools};
use crate::{PoolScope, RegistryConfig, RegistryError, RegistryEvent, ThreadingPolicy, TypeKey};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// The process-wide registry behind [`DependencyRegistry::instance`].
static GLOBAL_REGISTRY: LazyLock<DependencyRegistry> =
    LazyLock::new(|| DependencyRegistry::new(RegistryConfig::from_env_or_default()));

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives every [`RegistryEvent`] of the registry it is set on.
/// It is invoked without any registry lock held.
pub type TraceCallback = dyn Fn(&RegistryEvent) + Send + Sync + 'static;

/// Registry of named objects.
///
/// Objects live in one of two kinds of pools:
///
/// - the global pool, shared by every thread. [`ThreadingPolicy::ApplicationGlobal`]
///   accesses it behind a mutex, [`ThreadingPolicy::SingleThread`] accesses it without
///   waiting for that mutex;
/// - one pool per thread, used by [`ThreadingPolicy::ThreadLocal`]. A thread's pool is
///   created on first use and dropped with all its objects when the thread exits.
///
/// Lookups with a type lazily construct missing objects through the constructors
/// registered with [`register_type`][Self::register_type] and friends.
///
/// # Constructors and locking
///
/// Under `ApplicationGlobal` the constructor runs while the global pool is locked, which
/// guarantees a single construction per name. A constructor that calls back into the same
/// registry under `ApplicationGlobal` deadlocks.
///
/// Under `SingleThread` and `ThreadLocal` the pool is released while the constructor runs,
/// so constructors may resolve their own dependencies through the registry.
pub struct DependencyRegistry {
    id: u64,
    default_policy: AtomicU8,
    global: Mutex<Pool>,
    thread_pools: ThreadPools,
    factories: RwLock<FactoryTable>,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

/// Outcome of a successful lookup.
struct Lookup {
    entry: Entry,
    constructed: bool,
}

impl DependencyRegistry {
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        let id = NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed);

        Self {
            id,
            default_policy: AtomicU8::new(config.effective_default_policy().to_u8()),
            global: Mutex::new(Pool::default()),
            thread_pools: ThreadPools::new(id),
            factories: RwLock::new(FactoryTable::new()),
            trace: Mutex::new(None),
        }
    }

    /// Replaces the constructor table, e.g. with one prepared at startup.
    #[must_use]
    pub fn with_factories(mut self, factories: FactoryTable) -> Self {
        *self.factories.get_mut().unwrap_or_else(|p| p.into_inner()) = factories;
        self
    }

    /// The process-wide registry, created on first use.
    ///
    /// Its default policy comes from the `DEPENDENCY_REGISTRY_POLICY` environment variable,
    /// falling back to [`ThreadingPolicy::ThreadLocal`].
    pub fn instance() -> &'static DependencyRegistry {
        &GLOBAL_REGISTRY
    }

    // -------------------------------------------------------------------------------------------------
    // Policy
    // -------------------------------------------------------------------------------------------------

    /// The current default policy. Never [`ThreadingPolicy::Default`].
    pub fn default_policy(&self) -> ThreadingPolicy {
        ThreadingPolicy::from_u8(self.default_policy.load(Ordering::Relaxed))
    }

    /// Sets the policy used by operations that pass [`ThreadingPolicy::Default`].
    ///
    /// Passing `Default` has no effect. Change the policy before other threads start using
    /// the registry: objects already stored stay in the pool they were stored in, and callers
    /// racing with the change may resolve to either pool.
    pub fn set_default_policy(&self, policy: ThreadingPolicy) {
        if policy == ThreadingPolicy::Default {
            return;
        }

        debug!(registry = self.id, %policy, "default threading policy changed");
        self.default_policy.store(policy.to_u8(), Ordering::Relaxed);
    }

    /// The pool scope an access with `policy` lands in.
    pub fn resolve(&self, policy: ThreadingPolicy) -> PoolScope {
        policy
            .or(self.default_policy())
            .scope()
            .unwrap_or(PoolScope::ThreadLocal)
    }

    // -------------------------------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------------------------------

    /// Makes `T` constructible on demand through `T::default`.
    pub fn register_type<T: Default + Send + Sync + 'static>(&self) {
        self.factories_mut().register::<T>();
    }

    /// Makes `T` constructible on demand through `constructor`.
    pub fn register_constructor<T, F>(&self, constructor: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories_mut().register_with(constructor);
    }

    /// Makes `T` constructible through a constructor that may decline.
    pub fn register_fallible<T, F>(&self, constructor: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Option<T> + Send + Sync + 'static,
    {
        self.factories_mut().register_fallible(constructor);
    }

    /// Forgets the constructor of `ty`. Objects already built are kept.
    pub fn unregister_type(&self, ty: TypeKey) -> bool {
        self.factories_mut().unregister(ty)
    }

    /// Whether a missing object of type `ty` could be created on demand.
    pub fn is_constructible(&self, ty: TypeKey) -> bool {
        self.factories
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains(ty)
    }

    fn factories_mut(&self) -> RwLockWriteGuard<'_, FactoryTable> {
        self.factories.write().unwrap_or_else(|p| p.into_inner())
    }

    fn construct(&self, ty: TypeKey) -> Option<Handle> {
        // The table lock is released before the constructor runs.
        let constructor = self
            .factories
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .constructor(ty);

        constructor.and_then(|constructor| constructor())
    }

    // -------------------------------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------------------------------

    /// Returns object `name`, creating it first if it is missing and `expected` names a
    /// constructible type.
    ///
    /// If `expected` is given it is also used as a type check against the stored object.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] if the object is absent and no type was given, or the
    ///   type has no constructor, or the constructor declined
    /// - [`RegistryError::TypeMismatch`] if the object was stored as another type
    /// - [`RegistryError::PoolContended`] for a `SingleThread` access racing another caller
    /// - [`RegistryError::ThreadPoolUnavailable`] for a `ThreadLocal` access while the
    ///   thread is being torn down
    pub fn object_by_name(
        &self,
        name: &str,
        expected: Option<TypeKey>,
        policy: ThreadingPolicy,
    ) -> Result<Handle, RegistryError> {
        self.fetch(name, expected, policy).map(|entry| entry.value)
    }

    /// Returns object `name` as a `T`, creating it if it is missing and `T` is constructible.
    ///
    /// # Errors
    ///
    /// Same as [`object_by_name`][Self::object_by_name] with `T` as the expected type.
    pub fn get<T: Send + Sync + 'static>(
        &self,
        name: &str,
        policy: ThreadingPolicy,
    ) -> Result<Arc<T>, RegistryError> {
        let expected = TypeKey::of::<T>();
        let entry = self.fetch(name, Some(expected), policy)?;

        // Only an erased store that declared the wrong type can fail here.
        entry
            .value
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                name: name.to_string(),
                expected: expected.name(),
                found: "a value of another type",
            })
    }

    /// Returns an owned clone of object `name`.
    ///
    /// # Errors
    ///
    /// Same as [`get`][Self::get].
    pub fn get_cloned<T: Send + Sync + Clone + 'static>(
        &self,
        name: &str,
        policy: ThreadingPolicy,
    ) -> Result<T, RegistryError> {
        let arc = self.get::<T>(name, policy)?;
        Ok((*arc).clone())
    }

    fn fetch(
        &self,
        name: &str,
        expected: Option<TypeKey>,
        policy: ThreadingPolicy,
    ) -> Result<Entry, RegistryError> {
        let scope = self.resolve(policy);

        let result = match scope {
            PoolScope::GlobalLocked => self
                .with_pool(scope, |pool| self.lookup_or_construct(pool, name, expected))
                .and_then(|lookup| lookup),
            PoolScope::Unlocked | PoolScope::ThreadLocal => {
                self.lookup_then_construct(scope, name, expected)
            }
        };

        if let Ok(Lookup {
            entry,
            constructed: true,
        }) = &result
        {
            debug!(
                registry = self.id,
                name,
                type_name = entry.declared.name(),
                %scope,
                "constructed dependency"
            );
            self.emit_event(|| RegistryEvent::Construct {
                name: name.to_string(),
                type_name: entry.declared.name(),
                scope,
            });
        }

        trace!(registry = self.id, name, %scope, found = result.is_ok(), "dependency lookup");
        self.emit_event(|| RegistryEvent::Get {
            name: name.to_string(),
            scope,
            found: result.is_ok(),
        });

        result.map(|lookup| lookup.entry)
    }

    /// Lookup in the locked global pool, constructing while the caller holds the lock.
    fn lookup_or_construct(
        &self,
        pool: &mut Pool,
        name: &str,
        expected: Option<TypeKey>,
    ) -> Result<Lookup, RegistryError> {
        if let Some(entry) = pool.get(name) {
            return checked(name, entry.clone(), expected, false);
        }

        let ty = expected.ok_or_else(|| RegistryError::not_found(name))?;
        let value = self
            .construct(ty)
            .ok_or_else(|| RegistryError::not_found(name))?;

        let entry = Entry {
            value,
            declared: ty,
        };

        // The name is absent, so nothing is displaced.
        pool.insert(name, entry.clone());

        Ok(Lookup {
            entry,
            constructed: true,
        })
    }

    /// Lookup in a pool that is not held across construction: the unlocked global pool or
    /// the calling thread's pool. The constructor may itself use the same pool.
    fn lookup_then_construct(
        &self,
        scope: PoolScope,
        name: &str,
        expected: Option<TypeKey>,
    ) -> Result<Lookup, RegistryError> {
        let existing = self.with_pool(scope, |pool| pool.get(name).cloned())?;

        if let Some(entry) = existing {
            return checked(name, entry, expected, false);
        }

        let ty = expected.ok_or_else(|| RegistryError::not_found(name))?;
        let value = self
            .construct(ty)
            .ok_or_else(|| RegistryError::not_found(name))?;

        // A constructor that stored the same name wins over our instance.
        let (entry, rejected) = self.with_pool(scope, |pool| {
            pool.insert_if_absent(
                name,
                Entry {
                    value,
                    declared: ty,
                },
            )
        })?;

        let constructed = rejected.is_none();
        drop(rejected);

        checked(name, entry, expected, constructed)
    }

    /// Returns the declared type of object `name`, without constructing anything.
    pub fn object_type(&self, name: &str, policy: ThreadingPolicy) -> Option<TypeKey> {
        let scope = self.resolve(policy);

        let found = match scope {
            PoolScope::ThreadLocal => self
                .thread_pools
                .peek_current(|pool| pool.type_of(name))
                .flatten(),
            PoolScope::GlobalLocked | PoolScope::Unlocked => self
                .with_pool(scope, |pool| pool.type_of(name))
                .ok()
                .flatten(),
        };

        self.emit_event(|| RegistryEvent::Contains {
            name: name.to_string(),
            scope,
            found: found.is_some(),
        });

        found
    }

    /// Whether object `name` exists. Never constructs anything.
    pub fn has_object(&self, name: &str, policy: ThreadingPolicy) -> bool {
        self.object_type(name, policy).is_some()
    }

    // -------------------------------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------------------------------

    /// Stores `value` as object `name`, declared as `declared`, replacing any existing object.
    ///
    /// The caller is responsible for `value` really being a `declared`; typed lookups of a
    /// mis-declared value report a type mismatch.
    ///
    /// # Errors
    ///
    /// Only the pool-availability errors: [`RegistryError::PoolContended`] and
    /// [`RegistryError::ThreadPoolUnavailable`]. The pool is left untouched in that case.
    pub fn store_object(
        &self,
        name: &str,
        value: Handle,
        declared: TypeKey,
        policy: ThreadingPolicy,
    ) -> Result<(), RegistryError> {
        let scope = self.resolve(policy);

        let displaced =
            self.with_pool(scope, |pool| pool.insert(name, Entry { value, declared }))?;

        // Dropped here, after the pool is released, in case its destructor uses the registry.
        drop(displaced);

        debug!(
            registry = self.id,
            name,
            type_name = declared.name(),
            %scope,
            "stored dependency"
        );
        self.emit_event(|| RegistryEvent::Store {
            name: name.to_string(),
            type_name: declared.name(),
            scope,
        });

        Ok(())
    }

    /// Stores `value` as object `name`, replacing any existing object.
    ///
    /// This is the way to inject substitutes in tests: an object stored before the first
    /// lookup is never constructed.
    ///
    /// # Errors
    ///
    /// Same as [`store_object`][Self::store_object].
    pub fn store<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: T,
        policy: ThreadingPolicy,
    ) -> Result<(), RegistryError> {
        self.store_arc(name, Arc::new(value), policy)
    }

    /// Stores an `Arc`-wrapped value as object `name`.
    ///
    /// # Errors
    ///
    /// Same as [`store_object`][Self::store_object].
    pub fn store_arc<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: Arc<T>,
        policy: ThreadingPolicy,
    ) -> Result<(), RegistryError> {
        self.store_object(name, value, TypeKey::of::<T>(), policy)
    }

    // -------------------------------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------------------------------

    /// Drops the calling thread's pool and every object in it. Returns how many objects
    /// the pool held.
    ///
    /// Happens automatically when a thread exits. Calling it again, or on a thread that
    /// never used the registry, is a no-op.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ThreadPoolUnavailable`] if called while the thread's storage is
    /// being destroyed.
    pub fn teardown_current_thread(&self) -> Result<usize, RegistryError> {
        let released = self.thread_pools.release_current()?;

        debug!(registry = self.id, released, "released thread-local pool");
        self.emit_event(|| RegistryEvent::Teardown {
            scope: PoolScope::ThreadLocal,
            released,
        });

        Ok(released)
    }

    /// Releases every object the registry owns.
    ///
    /// The global pool and the calling thread's pool are emptied immediately. Pools of other
    /// threads are invalidated: they read as empty from now on and their objects are dropped
    /// the next time the owning thread uses the registry, or when it exits.
    ///
    /// Objects held by a thread that never touches the registry again stay alive until that
    /// thread exits: an idle worker thread keeps its objects.
    ///
    /// Safe to call repeatedly. Constructors and default policy are kept, so the registry
    /// remains usable.
    pub fn shutdown(&self) {
        let drained = std::mem::take(&mut *self.lock_global());
        let released = drained.len();
        drop(drained);

        let released_local = self.thread_pools.release_current().unwrap_or(0);
        self.thread_pools.invalidate_all();

        debug!(
            registry = self.id,
            released,
            released_local,
            "registry shut down"
        );
        self.emit_event(|| RegistryEvent::Teardown {
            scope: PoolScope::GlobalLocked,
            released,
        });
        self.emit_event(|| RegistryEvent::Teardown {
            scope: PoolScope::ThreadLocal,
            released: released_local,
        });
    }

    /// Number of objects in the global pool.
    pub fn global_object_count(&self) -> usize {
        self.lock_global().len()
    }

    /// Number of thread-local pools currently allocated, including pools invalidated by
    /// [`shutdown`][Self::shutdown] whose threads have not touched the registry since.
    pub fn thread_pool_count(&self) -> usize {
        self.thread_pools.live()
    }

    // -------------------------------------------------------------------------------------------------
    // Pool access
    // -------------------------------------------------------------------------------------------------

    fn lock_global(&self) -> MutexGuard<'_, Pool> {
        // A panicking constructor poisons the lock without corrupting the map.
        self.global.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn try_global(&self) -> Result<MutexGuard<'_, Pool>, RegistryError> {
        match self.global.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                warn!(
                    registry = self.id,
                    "single-thread pool accessed concurrently"
                );
                Err(RegistryError::PoolContended)
            }
        }
    }

    fn with_pool<R>(
        &self,
        scope: PoolScope,
        f: impl FnOnce(&mut Pool) -> R,
    ) -> Result<R, RegistryError> {
        match scope {
            PoolScope::GlobalLocked => Ok(f(&mut *self.lock_global())),
            PoolScope::Unlocked => Ok(f(&mut *self.try_global()?)),
            PoolScope::ThreadLocal => self.thread_pools.with_current(f),
        }
    }

    // -------------------------------------------------------------------------------------------------
    // Tracing
    // -------------------------------------------------------------------------------------------------

    /// Sets a callback invoked for every registry operation.
    ///
    /// The callback runs with no registry lock held, so it may use the registry, but it
    /// should not store or construct objects or it will see its own events.
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    /// Clears the tracing callback.
    pub fn clear_trace_callback(&self) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    fn emit_event(&self, event: impl FnOnce() -> RegistryEvent) {
        let callback = self
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();

        if let Some(callback) = callback {
            callback(&event());
        }
    }
}

fn checked(
    name: &str,
    entry: Entry,
    expected: Option<TypeKey>,
    constructed: bool,
) -> Result<Lookup, RegistryError> {
    match expected {
        Some(ty) if ty != entry.declared => Err(RegistryError::TypeMismatch {
            name: name.to_string(),
            expected: ty.name(),
            found: entry.declared.name(),
        }),
        _ => Ok(Lookup { entry, constructed }),
    }
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Drop for DependencyRegistry {
    fn drop(&mut self) {
        // Other threads drop their pools of this registry when they exit, or when they
        // first use a registry created after this one.
        let _ = self.thread_pools.release_current();
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("id", &self.id)
            .field("default_policy", &self.default_policy())
            .field("thread_pools", &self.thread_pool_count())
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
