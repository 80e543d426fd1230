//! Observable state container with a persisted snapshot.
//!
//! [`PersistedStore`] is the pattern every storefront store is built on:
//!
//! 1. State lives behind a lock and is only changed through [`PersistedStore::set`].
//! 2. After each change the full state is written to [`Storage`] as
//!    `{"state": <S>, "version": <n>}` under the store's name.
//! 3. Listeners registered with [`PersistedStore::subscribe`] are then called
//!    synchronously with the new and previous state, in registration order.
//!
//! Storage failures never reach callers. Writes are best-effort and logged;
//! unreadable snapshots are treated as absent. Writes are serialized so the
//! last snapshot written is always the latest state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::storage::Storage;

type Listener<S> = Arc<dyn Fn(&S, &S) + Send + Sync>;

/// Where and how a store persists its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOptions {
    /// Storage key, e.g. `"auth"` or `"cart"`.
    pub name: String,
    /// Snapshot schema version. Snapshots with another version are ignored.
    pub version: u32,
}

impl PersistOptions {
    /// Options for `name` at version 0.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
        }
    }

    /// Set the snapshot schema version.
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// What an [`PersistedStore::update`] closure did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Nothing changed: no write, no notification.
    Unchanged,
    /// Changed in memory only. Listeners are notified, storage is untouched.
    InMemory,
    /// Changed and persisted, then listeners are notified.
    Persisted,
}

/// On-disk layout of a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot<S> {
    pub state: S,
    pub version: u32,
}

/// Generic observable state container with durable persistence.
///
/// Cloning yields another handle to the same store.
pub struct PersistedStore<S> {
    inner: Arc<StoreInner<S>>,
}

struct StoreInner<S> {
    state: RwLock<S>,
    listeners: Mutex<Vec<(u64, Listener<S>)>>,
    next_listener_id: AtomicU64,
    /// Held from mutation until the snapshot is written.
    write_order: Mutex<()>,
    storage: Arc<dyn Storage>,
    options: PersistOptions,
}

impl<S> Clone for PersistedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for PersistedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStore")
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl<S> PersistedStore<S>
where
    S: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a store holding `initial`. Nothing is read or written yet.
    #[must_use]
    pub fn new(initial: S, storage: Arc<dyn Storage>, options: PersistOptions) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                write_order: Mutex::new(()),
                storage,
                options,
            }),
        }
    }

    /// A clone of the current state.
    #[must_use]
    pub fn get(&self) -> S {
        self.with(S::clone)
    }

    /// Borrow the current state for the duration of `f`.
    ///
    /// `f` must not call back into this store's mutators.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Apply `update`, persist the new state, then notify listeners.
    pub fn set(&self, update: impl FnOnce(&mut S)) {
        self.update(|state| {
            update(state);
            Change::Persisted
        });
    }

    /// Apply `update` and act on the [`Change`] it reports.
    ///
    /// The closure runs under the write lock, so a check and the mutation it
    /// guards are atomic. Concurrent updates persist in the order they were
    /// applied. Listeners run after all locks are released.
    pub fn update(&self, update: impl FnOnce(&mut S) -> Change) -> Change {
        let (change, previous, next) = {
            let _order = self
                .inner
                .write_order
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let (change, previous, next) = {
                let mut state = self
                    .inner
                    .state
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                let previous = state.clone();
                let change = update(&mut state);
                (change, previous, state.clone())
            };

            if change == Change::Persisted {
                self.persist(&next);
            }
            (change, previous, next)
        };

        if change != Change::Unchanged {
            self.notify(&next, &previous);
        }
        change
    }

    /// Register a listener called with `(new, previous)` after every change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(&self, listener: impl Fn(&S, &S) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        let weak: Weak<StoreInner<S>> = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .listeners
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(listener_id, _)| *listener_id != id);
                }
            })),
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Read this store's persisted snapshot, if a usable one exists.
    ///
    /// Returns `None` when the key is absent, unreadable, not valid JSON for
    /// `S`, or written with a different version.
    #[must_use]
    pub fn load_persisted(&self) -> Option<S> {
        let name = &self.inner.options.name;
        let raw = match self.inner.storage.get_item(name) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(store = %name, error = %e, "Failed to read persisted snapshot");
                return None;
            }
        };

        let snapshot: PersistedSnapshot<S> = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(store = %name, error = %e, "Discarding corrupt persisted snapshot");
                return None;
            }
        };

        if snapshot.version != self.inner.options.version {
            tracing::warn!(
                store = %name,
                found = snapshot.version,
                expected = self.inner.options.version,
                "Discarding persisted snapshot with mismatched version"
            );
            return None;
        }

        Some(snapshot.state)
    }

    fn persist(&self, state: &S) {
        let name = &self.inner.options.name;
        let snapshot = PersistedSnapshot {
            state,
            version: self.inner.options.version,
        };

        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(store = %name, error = %e, "Failed to serialize snapshot");
                return;
            }
        };

        if let Err(e) = self.inner.storage.set_item(name, &raw) {
            tracing::warn!(store = %name, error = %e, "Failed to persist snapshot");
        }
    }

    fn notify(&self, next: &S, previous: &S) {
        // Snapshot the listener list so listeners may (un)subscribe or mutate.
        let listeners: Vec<Listener<S>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(next, previous);
        }
    }
}

/// Handle keeping a store listener registered.
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::storage::MemoryStorage;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    fn counter_store(storage: &MemoryStorage) -> PersistedStore<Counter> {
        PersistedStore::new(
            Counter::default(),
            Arc::new(storage.clone()),
            PersistOptions::new("counter"),
        )
    }

    #[test]
    fn test_set_persists_envelope() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);

        store.set(|s| s.count = 3);

        let raw = storage.get_item("counter").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "state": { "count": 3 }, "version": 0 }));
    }

    #[test]
    fn test_load_persisted_round_trip() {
        let storage = MemoryStorage::new();
        counter_store(&storage).set(|s| s.count = 9);

        let fresh = counter_store(&storage);
        assert_eq!(fresh.get(), Counter::default());
        assert_eq!(fresh.load_persisted(), Some(Counter { count: 9 }));
    }

    #[test]
    fn test_load_persisted_ignores_corrupt_and_wrong_version() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);

        storage.set_item("counter", "{not json").unwrap();
        assert_eq!(store.load_persisted(), None);

        storage
            .set_item("counter", r#"{"state":{"count":1},"version":2}"#)
            .unwrap();
        assert_eq!(store.load_persisted(), None);

        let v2 = PersistedStore::<Counter>::new(
            Counter::default(),
            Arc::new(storage.clone()),
            PersistOptions::new("counter").with_version(2),
        );
        assert_eq!(v2.load_persisted(), Some(Counter { count: 1 }));
    }

    #[test]
    fn test_listeners_get_new_and_previous() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |next: &Counter, prev: &Counter| {
            sink.lock().unwrap().push((prev.count, next.count));
        });

        store.set(|s| s.count += 1);
        store.set(|s| s.count += 2);

        assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (1, 3)]);
    }

    #[test]
    fn test_unsubscribe_and_drop() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&calls);
        let first = store.subscribe(move |_, _| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&calls);
        let second = store.subscribe(move |_, _| {
            c2.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(store.listener_count(), 2);

        store.set(|s| s.count = 1);
        assert_eq!(calls.load(Ordering::SeqCst), 11);

        first.unsubscribe();
        store.set(|s| s.count = 2);
        assert_eq!(calls.load(Ordering::SeqCst), 21);

        drop(second);
        assert_eq!(store.listener_count(), 0);
        store.set(|s| s.count = 3);
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn test_listener_can_read_store() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);
        let observed = Arc::new(AtomicU64::new(0));

        let handle = store.clone();
        let sink = Arc::clone(&observed);
        let _sub = store.subscribe(move |_, _| {
            let count = handle.with(|s| s.count);
            sink.store(u64::from(count), Ordering::SeqCst);
        });

        store.set(|s| s.count = 5);
        assert_eq!(observed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_update_in_memory_and_unchanged() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let _sub = store.subscribe(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let change = store.update(|s| {
            s.count = 4;
            Change::InMemory
        });
        assert_eq!(change, Change::InMemory);
        assert_eq!(store.get().count, 4);
        assert!(storage.get_item("counter").unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(store.update(|_| Change::Unchanged), Change::Unchanged);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_sets_persist_latest_state() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.set(|s| s.count += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get().count, 400);
        assert_eq!(store.load_persisted(), Some(Counter { count: 400 }));
    }

    #[test]
    fn test_subscription_outliving_store_is_harmless() {
        let storage = MemoryStorage::new();
        let store = counter_store(&storage);
        let sub = store.subscribe(|_, _| {});
        drop(store);
        sub.unsubscribe();
    }
}
