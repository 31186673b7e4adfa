//! In-process event registry
//!
//! Maps event keys to ordered sets of handlers and dispatches payloads to them
//! synchronously on the caller's thread. [`EventRegistry`] uses one payload type
//! for all keys; [`TypedRegistry`] lets each [`Event`] type carry its own.

mod config;
mod dispatch;
mod error;
mod handler;
mod registry;
mod typed;

pub use config::{FailurePolicy, RegistryConfig};
pub use error::{BoxError, EventError, HandlerFailure, Result};
pub use handler::{Handler, HandlerResult};
pub use registry::EventRegistry;
pub use typed::{global, Event, TypedRegistry};
