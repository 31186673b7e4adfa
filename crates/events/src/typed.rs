//! Registry where every event key fixes its own payload type at compile time

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::config::RegistryConfig;
use crate::dispatch::run_handlers;
use crate::error::Result;
use crate::handler::{Handler, HandlerSet};

/// An event key together with the payload type it carries.
///
/// Implement it on a marker type per event; the set of impls is the
/// key-to-payload contract, and handlers or payloads of the wrong type are
/// rejected by the compiler.
///
/// ```ignore
/// struct ErrorRaised;
///
/// impl Event for ErrorRaised {
///     type Payload = ErrorInfo;
///     const NAME: &'static str = "error";
/// }
/// ```
pub trait Event: 'static {
    type Payload: 'static;

    /// Name used in logs and errors
    const NAME: &'static str;
}

struct Slot {
    name: &'static str,
    /// Always a `HandlerSet<E::Payload>` for the event type this slot is keyed by
    handlers: Box<dyn Any + Send + Sync>,
}

impl Slot {
    fn new<E: Event>() -> Self {
        Self {
            name: E::NAME,
            handlers: Box::new(HandlerSet::<E::Payload>::new()),
        }
    }

    fn get<E: Event>(&self) -> Option<&HandlerSet<E::Payload>> {
        self.handlers.downcast_ref()
    }

    fn get_mut<E: Event>(&mut self) -> Option<&mut HandlerSet<E::Payload>> {
        self.handlers.downcast_mut()
    }
}

struct Inner {
    entries: RwLock<HashMap<TypeId, Slot>>,
    dispatch_count: AtomicUsize,
    config: RegistryConfig,
}

/// Event registry keyed by [`Event`] types.
///
/// Semantics match [`EventRegistry`](crate::EventRegistry): ordered,
/// duplicate-free handler sets, no empty entries, snapshot dispatch.
#[derive(Clone)]
pub struct TypedRegistry {
    inner: Arc<Inner>,
}

impl TypedRegistry {
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

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Slot>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Slot>> {
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a handler for `E`. Returns false if it was already registered.
    pub fn register<E: Event>(&self, handler: Handler<E::Payload>) -> bool {
        let mut entries = self.write();
        let slot = entries.entry(TypeId::of::<E>()).or_insert_with(|| {
            debug!(event = E::NAME, "Creating event entry");
            Slot::new::<E>()
        });

        let added = slot
            .get_mut::<E>()
            .map_or(false, |set| set.insert(handler.clone()));
        trace!(event = E::NAME, handler = %handler.id(), added, "Register handler");
        added
    }

    /// Remove one handler of `E`, or every handler when `handler` is `None`
    pub fn deregister<E: Event>(&self, handler: Option<&Handler<E::Payload>>) -> bool {
        let key = TypeId::of::<E>();
        let mut entries = self.write();

        let Some(handler) = handler else {
            let removed = entries.remove(&key).is_some();
            if removed {
                debug!(event = E::NAME, "Removed event entry");
            }
            return removed;
        };

        let Some(set) = entries.get_mut(&key).and_then(Slot::get_mut::<E>) else {
            return false;
        };
        let removed = set.remove(handler);
        trace!(event = E::NAME, handler = %handler.id(), removed, "Deregister handler");

        if set.is_empty() {
            entries.remove(&key);
            debug!(event = E::NAME, "Removed empty event entry");
        }
        removed
    }

    /// Invoke every handler of `E` in registration order.
    ///
    /// Uses the same snapshot and failure rules as
    /// [`EventRegistry::dispatch`](crate::EventRegistry::dispatch).
    pub fn dispatch<E: Event>(&self, payload: &E::Payload) -> Result<usize> {
        self.inner.dispatch_count.fetch_add(1, Ordering::Relaxed);

        let handlers = match self
            .read()
            .get(&TypeId::of::<E>())
            .and_then(Slot::get::<E>)
        {
            Some(set) => set.snapshot(),
            None => {
                if self.inner.config.log_unhandled {
                    debug!(event = E::NAME, "No handlers registered for event");
                }
                return Ok(0);
            }
        };

        trace!(event = E::NAME, handlers = handlers.len(), "Dispatching event");
        run_handlers(E::NAME, &handlers, payload, self.inner.config.failure_policy)
    }

    pub fn contains<E: Event>(&self) -> bool {
        self.read().contains_key(&TypeId::of::<E>())
    }

    pub fn handler_count<E: Event>(&self) -> usize {
        self.read()
            .get(&TypeId::of::<E>())
            .and_then(Slot::get::<E>)
            .map_or(0, HandlerSet::len)
    }

    /// Names of events that currently have handlers, in no particular order
    pub fn event_names(&self) -> Vec<&'static str> {
        self.read().values().map(|slot| slot.name).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
        debug!("Cleared typed event registry");
    }

    pub fn dispatch_count(&self) -> usize {
        self.inner.dispatch_count.load(Ordering::Relaxed)
    }
}

impl Default for TypedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRegistry")
            .field("events", &self.event_names())
            .field("dispatch_count", &self.dispatch_count())
            .finish()
    }
}

/// Process-wide default registry, created on first use.
///
/// Prefer owning a [`TypedRegistry`] where possible; this instance is shared by
/// everything in the process, tests included.
pub fn global() -> &'static TypedRegistry {
    static GLOBAL: OnceLock<TypedRegistry> = OnceLock::new();
    GLOBAL.get_or_init(TypedRegistry::new)
}
