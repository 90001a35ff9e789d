//! Name → entry storage and the per-thread pool slot.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{hash_map, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::{RegistryError, TypeKey};

/// Type-erased shared handle to a stored object.
pub type Handle = Arc<dyn Any + Send + Sync>;

/// A stored value together with the type it was declared as.
#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) value: Handle,
    pub(crate) declared: TypeKey,
}

/// One name → entry map.
#[derive(Default)]
pub(crate) struct Pool {
    entries: HashMap<String, Entry>,
}

impl Pool {
    pub(crate) fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub(crate) fn type_of(&self, name: &str) -> Option<TypeKey> {
        self.entries.get(name).map(|entry| entry.declared)
    }

    /// Overwrites `name`, handing back whatever was stored before so the
    /// caller can drop it outside any lock.
    pub(crate) fn insert(&mut self, name: &str, entry: Entry) -> Option<Entry> {
        self.entries.insert(name.to_string(), entry)
    }

    /// Stores `entry` unless `name` is already taken. Returns the entry that
    /// ends up in the pool, plus `entry` itself if it was turned away.
    pub(crate) fn insert_if_absent(&mut self, name: &str, entry: Entry) -> (Entry, Option<Entry>) {
        match self.entries.entry(name.to_string()) {
            hash_map::Entry::Occupied(occupied) => (occupied.get().clone(), Some(entry)),
            hash_map::Entry::Vacant(vacant) => (vacant.insert(entry).clone(), None),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// -------------------------------------------------------------------------------------------------
// Thread-local pools
// -------------------------------------------------------------------------------------------------

/// A thread's pool for one registry, stamped with the registry generation it
/// was created in.
struct ThreadPool {
    generation: u64,
    pool: Pool,
    // Dangles once the owning registry is gone.
    live: Weak<AtomicUsize>,
}

impl ThreadPool {
    fn is_orphaned(&self) -> bool {
        self.live.strong_count() == 0
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Some(live) = self.live.upgrade() {
            live.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

thread_local! {
    // Keyed by registry id. Dropped, with every stored value, when the thread exits.
    static THREAD_POOLS: RefCell<HashMap<u64, ThreadPool>> = RefCell::new(HashMap::new());
}

/// Access to the calling thread's pool of one registry.
///
/// The pools themselves live in thread-local storage and are never locked.
/// Stored values are never dropped while the slot is borrowed, so a value
/// whose destructor calls back into the registry does not trip over the
/// borrow.
pub(crate) struct ThreadPools {
    registry_id: u64,
    generation: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl ThreadPools {
    pub(crate) fn new(registry_id: u64) -> Self {
        Self {
            registry_id,
            generation: AtomicU64::new(0),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runs `f` against the calling thread's pool, creating the pool first if
    /// this thread has none yet.
    ///
    /// A pool left over from before the last [`invalidate_all`][Self::invalidate_all]
    /// is emptied before `f` sees it. Creating a pool also evicts this thread's pools of
    /// registries that have since been dropped.
    pub(crate) fn with_current<R>(
        &self,
        f: impl FnOnce(&mut Pool) -> R,
    ) -> Result<R, RegistryError> {
        let generation = self.generation.load(Ordering::Acquire);

        let (result, stale, orphaned) = THREAD_POOLS
            .try_with(|slots| {
                let mut slots = slots
                    .try_borrow_mut()
                    .map_err(|_| RegistryError::ThreadPoolUnavailable)?;

                let orphaned = if slots.contains_key(&self.registry_id) {
                    Vec::new()
                } else {
                    evict_orphans(&mut slots)
                };

                let slot = slots.entry(self.registry_id).or_insert_with(|| {
                    self.live.fetch_add(1, Ordering::Relaxed);
                    ThreadPool {
                        generation,
                        pool: Pool::default(),
                        live: Arc::downgrade(&self.live),
                    }
                });

                let stale = if slot.generation == generation {
                    None
                } else {
                    slot.generation = generation;
                    Some(std::mem::take(&mut slot.pool))
                };

                Ok((f(&mut slot.pool), stale, orphaned))
            })
            .map_err(|_| RegistryError::ThreadPoolUnavailable)??;

        drop(stale);
        drop(orphaned);
        Ok(result)
    }

    /// Like [`with_current`][Self::with_current] but never creates a pool.
    pub(crate) fn peek_current<R>(&self, f: impl FnOnce(&Pool) -> R) -> Option<R> {
        let generation = self.generation.load(Ordering::Acquire);

        THREAD_POOLS
            .try_with(|slots| {
                let slots = slots.try_borrow().ok()?;
                let slot = slots.get(&self.registry_id)?;
                (slot.generation == generation).then(|| f(&slot.pool))
            })
            .ok()
            .flatten()
    }

    /// Removes the calling thread's pool. Returns how many entries it held.
    pub(crate) fn release_current(&self) -> Result<usize, RegistryError> {
        let generation = self.generation.load(Ordering::Acquire);

        let removed = THREAD_POOLS
            .try_with(|slots| {
                slots
                    .try_borrow_mut()
                    .map(|mut slots| slots.remove(&self.registry_id))
                    .map_err(|_| RegistryError::ThreadPoolUnavailable)
            })
            .map_err(|_| RegistryError::ThreadPoolUnavailable)??;

        let released = removed
            .as_ref()
            .filter(|slot| slot.generation == generation)
            .map_or(0, |slot| slot.pool.len());

        drop(removed);
        Ok(released)
    }

    /// Marks every thread's pool as stale. Each one is emptied the next time
    /// its thread touches the registry, or dropped when the thread exits.
    pub(crate) fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of thread pools currently allocated for this registry.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

/// Takes out the pools whose registry no longer exists, for the caller to drop
/// once the slot borrow is released.
fn evict_orphans(slots: &mut HashMap<u64, ThreadPool>) -> Vec<ThreadPool> {
    let dead: Vec<u64> = slots
        .iter()
        .filter(|(_, slot)| slot.is_orphaned())
        .map(|(id, _)| *id)
        .collect();

    dead.into_iter()
        .filter_map(|id| slots.remove(&id))
        .collect()
}
