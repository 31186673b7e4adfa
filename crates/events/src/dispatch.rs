use std::fmt::Debug;

use tracing::{trace, warn};

use crate::config::FailurePolicy;
use crate::error::{EventError, HandlerFailure, Result};
use crate::handler::Handler;

/// Invoke a snapshot of handlers in order.
///
/// No registry lock may be held here: handlers are allowed to call back into
/// the registry that is dispatching them.
pub(crate) fn run_handlers<K, P>(
    key: &K,
    handlers: &[Handler<P>],
    payload: &P,
    policy: FailurePolicy,
) -> Result<usize>
where
    K: Debug + ?Sized,
{
    let mut failures = Vec::new();

    for handler in handlers {
        trace!(key = ?key, handler = %handler.id(), "Invoking handler");
        if let Err(error) = handler.call(payload) {
            warn!(key = ?key, handler = %handler.id(), error = %error, "Handler failed");
            match policy {
                FailurePolicy::FailFast => {
                    return Err(EventError::Handler {
                        key: format!("{key:?}"),
                        handler: handler.id(),
                        source: error,
                    });
                }
                FailurePolicy::Isolate => failures.push(HandlerFailure {
                    handler: handler.id(),
                    error,
                }),
            }
        }
    }

    if failures.is_empty() {
        Ok(handlers.len())
    } else {
        Err(EventError::Dispatch {
            key: format!("{key:?}"),
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Handler<()> {
        let log = log.clone();
        Handler::new(move |_| log.lock().unwrap().push(name))
    }

    fn failing(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Handler<()> {
        let log = log.clone();
        Handler::try_new(move |_| {
            log.lock().unwrap().push(name);
            Err("failed")
        })
    }

    #[test]
    fn test_fail_fast_stops_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = vec![
            recording(&log, "a"),
            failing(&log, "b"),
            recording(&log, "c"),
        ];

        let err = run_handlers("k", &handlers, &(), FailurePolicy::FailFast).unwrap_err();
        assert!(matches!(err, EventError::Handler { ref handler, .. } if *handler == handlers[1].id()));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_isolate_runs_every_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = vec![
            failing(&log, "a"),
            recording(&log, "b"),
            failing(&log, "c"),
        ];

        let err = run_handlers("k", &handlers, &(), FailurePolicy::Isolate).unwrap_err();
        match err {
            EventError::Dispatch { key, failures } => {
                assert_eq!(key, "\"k\"");
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].handler, handlers[0].id());
                assert_eq!(failures[1].handler, handlers[2].id());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_returns_invoked_count() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = vec![recording(&log, "a"), recording(&log, "b")];

        let count = run_handlers("k", &handlers, &(), FailurePolicy::FailFast).unwrap();
        assert_eq!(count, 2);
    }
}
