//! Handler references and the per-key handler collection

use std::sync::Arc;

use uuid::Uuid;

use crate::error::BoxError;

/// Result returned by every handler invocation
pub type HandlerResult = std::result::Result<(), BoxError>;

type HandlerFn<P> = dyn Fn(&P) -> HandlerResult + Send + Sync;

/// Reference to a callback that receives an event payload.
///
/// Cloning a `Handler` yields another reference to the same callback, and the
/// registry compares handlers by that identity: registering a clone of an already
/// registered handler is a no-op, while two separate `Handler::new` calls on
/// identical closures produce two distinct handlers.
pub struct Handler<P> {
    id: Uuid,
    func: Arc<HandlerFn<P>>,
}

impl<P: 'static> Handler<P> {
    /// Wrap an infallible callback
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        Self::from_fn(move |payload: &P| {
            func(payload);
            Ok(())
        })
    }

    /// Wrap a callback that can fail.
    ///
    /// A returned error stops or is collected by dispatch depending on the
    /// registry's [`FailurePolicy`](crate::FailurePolicy).
    pub fn try_new<F, E>(func: F) -> Self
    where
        F: Fn(&P) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::from_fn(move |payload: &P| func(payload).map_err(Into::into))
    }

    fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&P) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            func: Arc::new(func),
        }
    }
}

impl<P> Handler<P> {
    /// Identifier shared by all clones of this handler
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Invoke the callback directly
    pub fn call(&self, payload: &P) -> HandlerResult {
        (self.func)(payload)
    }

    /// Whether both values refer to the same callback
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl<P> Clone for Handler<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            func: Arc::clone(&self.func),
        }
    }
}

impl<P> PartialEq for Handler<P> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl<P> Eq for Handler<P> {}

impl<P> std::fmt::Debug for Handler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("id", &self.id).finish()
    }
}

/// Insertion-ordered, duplicate-free set of handlers for one key
pub(crate) struct HandlerSet<P> {
    handlers: Vec<Handler<P>>,
}

impl<P> HandlerSet<P> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Returns false if the handler was already present
    pub(crate) fn insert(&mut self, handler: Handler<P>) -> bool {
        if self.handlers.iter().any(|h| h.same(&handler)) {
            return false;
        }
        self.handlers.push(handler);
        true
    }

    pub(crate) fn remove(&mut self, handler: &Handler<P>) -> bool {
        match self.handlers.iter().position(|h| h.same(handler)) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Copy of the current handlers, in registration order
    pub(crate) fn snapshot(&self) -> Vec<Handler<P>> {
        self.handlers.clone()
    }
}
