//! Keyed event registry with synchronous dispatch

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::config::RegistryConfig;
use crate::dispatch::run_handlers;
use crate::error::Result;
use crate::handler::{Handler, HandlerSet};

struct Inner<K, P> {
    entries: RwLock<HashMap<K, HandlerSet<P>>>,
    /// Number of dispatch calls (for monitoring)
    dispatch_count: AtomicUsize,
    config: RegistryConfig,
}

/// Registry mapping event keys to ordered sets of handlers.
///
/// All handlers of one registry take the same payload type `P`; use an enum
/// payload or a [`TypedRegistry`](crate::TypedRegistry) when each key carries its
/// own payload type.
///
/// Cloning yields another handle to the same registry. Independent registries
/// are created with [`EventRegistry::new`].
pub struct EventRegistry<K, P> {
    inner: Arc<Inner<K, P>>,
}

impl<K, P> EventRegistry<K, P>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an empty registry with default config
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                dispatch_count: AtomicUsize::new(0),
                config,
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    // A panicking handler never holds the lock, and every write leaves the map
    // consistent, so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, HandlerSet<P>>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, HandlerSet<P>>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a handler for `key`, creating the entry on first use.
    ///
    /// Returns false if this exact handler was already registered for `key`.
    pub fn register(&self, key: impl Into<K>, handler: Handler<P>) -> bool {
        let key = key.into();
        let mut entries = self.write();

        match entries.get_mut(&key) {
            Some(set) => {
                let added = set.insert(handler.clone());
                trace!(key = ?key, handler = %handler.id(), added, "Register handler");
                added
            }
            None => {
                debug!(key = ?key, handler = %handler.id(), "Creating event entry");
                let mut set = HandlerSet::new();
                set.insert(handler);
                entries.insert(key, set);
                true
            }
        }
    }

    /// Remove one handler, or the whole entry when `handler` is `None`.
    ///
    /// Removing the last handler removes the entry. Unknown keys and handlers
    /// are ignored; the return value tells whether anything was removed.
    pub fn deregister<Q>(&self, key: &Q, handler: Option<&Handler<P>>) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut entries = self.write();

        let Some(handler) = handler else {
            let removed = entries.remove(key).is_some();
            if removed {
                debug!(key = ?key, "Removed event entry");
            }
            return removed;
        };

        let Some(set) = entries.get_mut(key) else {
            return false;
        };
        let removed = set.remove(handler);
        trace!(key = ?key, handler = %handler.id(), removed, "Deregister handler");

        if set.is_empty() {
            entries.remove(key);
            debug!(key = ?key, "Removed empty event entry");
        }
        removed
    }

    /// Invoke every handler registered for `key`, in registration order.
    ///
    /// The handler set is snapshotted before the first call, so registrations
    /// and removals made by handlers take effect from the next dispatch.
    /// Returns the number of handlers invoked; a key without handlers yields 0.
    pub fn dispatch<Q>(&self, key: &Q, payload: &P) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.inner.dispatch_count.fetch_add(1, Ordering::Relaxed);

        let handlers = match self.read().get(key) {
            Some(set) => set.snapshot(),
            None => {
                if self.inner.config.log_unhandled {
                    debug!(key = ?key, "No handlers registered for event");
                }
                return Ok(0);
            }
        };

        trace!(key = ?key, handlers = handlers.len(), "Dispatching event");
        run_handlers(key, &handlers, payload, self.inner.config.failure_policy)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().contains_key(key)
    }

    /// Number of handlers registered for `key`
    pub fn handler_count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.read().get(key).map_or(0, HandlerSet::len)
    }

    /// Keys that currently have handlers, in no particular order
    pub fn keys(&self) -> Vec<K> {
        self.read().keys().cloned().collect()
    }

    /// Number of keys with at least one handler
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.write().clear();
        debug!("Cleared event registry");
    }

    /// Total number of dispatch calls, including those with no handlers
    pub fn dispatch_count(&self) -> usize {
        self.inner.dispatch_count.load(Ordering::Relaxed)
    }
}

impl<K, P> Clone for EventRegistry<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, P> Default for EventRegistry<K, P>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> std::fmt::Debug for EventRegistry<K, P>
where
    K: Eq + Hash + Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("key_count", &self.len())
            .field("dispatch_count", &self.dispatch_count())
            .finish()
    }
}
