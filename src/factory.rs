//! Constructors the registry falls back to when a requested object is absent.
//!
//! A [`FactoryTable`] maps a [`TypeKey`] to a zero-argument constructor. Types
//! have to be registered here before the registry can create them on demand;
//! requesting an unregistered type simply reports the object as not found.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::pool::Handle;
use crate::TypeKey;

/// Shared constructor returning a type-erased instance, or `None` when it
/// declines to build one.
pub(crate) type Constructor = Arc<dyn Fn() -> Option<Handle> + Send + Sync>;

/// Table of default constructors keyed by type.
#[derive(Default, Clone)]
pub struct FactoryTable {
    constructors: HashMap<TypeKey, Constructor>,
}

impl FactoryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T::default` as the constructor of `T`.
    ///
    /// Registering a type twice replaces the previous constructor.
    pub fn register<T: Default + Send + Sync + 'static>(&mut self) {
        self.register_with(T::default);
    }

    /// Registers `constructor` as the way to build a `T`.
    pub fn register_with<T, F>(&mut self, constructor: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_fallible(move || Some(constructor()));
    }

    /// Registers a constructor that may refuse to build a `T`.
    ///
    /// When it returns `None` the registry treats the object as not found and
    /// stores nothing.
    pub fn register_fallible<T, F>(&mut self, constructor: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Option<T> + Send + Sync + 'static,
    {
        let erased: Constructor =
            Arc::new(move || constructor().map(|value| Arc::new(value) as Handle));

        self.constructors.insert(TypeKey::of::<T>(), erased);
    }

    /// Removes the constructor of `ty`. Returns whether one was registered.
    pub fn unregister(&mut self, ty: TypeKey) -> bool {
        self.constructors.remove(&ty).is_some()
    }

    #[must_use]
    pub fn contains(&self, ty: TypeKey) -> bool {
        self.constructors.contains_key(&ty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Builds a new instance of `ty`, if a constructor exists and agrees to.
    #[must_use]
    pub fn construct(&self, ty: TypeKey) -> Option<Handle> {
        self.constructor(ty).and_then(|constructor| constructor())
    }

    pub(crate) fn constructor(&self, ty: TypeKey) -> Option<Constructor> {
        self.constructors.get(&ty).cloned()
    }
}

impl fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}
