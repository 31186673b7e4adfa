use thiserror::Error;
use uuid::Uuid;

/// Boxed error returned by fallible handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single handler failure collected while dispatching with
/// [`FailurePolicy::Isolate`](crate::FailurePolicy::Isolate)
#[derive(Debug)]
pub struct HandlerFailure {
    /// Id of the handler that failed
    pub handler: Uuid,
    /// The error the handler returned
    pub error: BoxError,
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handler {}: {}", self.handler, self.error)
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Handler {handler} failed for event {key}: {source}")]
    Handler {
        key: String,
        handler: Uuid,
        #[source]
        source: BoxError,
    },

    #[error("{} handler(s) failed for event {key}", .failures.len())]
    Dispatch {
        key: String,
        failures: Vec<HandlerFailure>,
    },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EventError {
    /// Event key the failure was raised for, if it came from a dispatch
    pub fn key(&self) -> Option<&str> {
        match self {
            EventError::Handler { key, .. } | EventError::Dispatch { key, .. } => Some(key),
            EventError::Config(_) | EventError::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let id = Uuid::new_v4();
        let error = EventError::Handler {
            key: "\"error\"".to_string(),
            handler: id,
            source: "boom".into(),
        };
        let msg = error.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("boom"));
        assert_eq!(error.key(), Some("\"error\""));
    }

    #[test]
    fn test_dispatch_error_counts_failures() {
        let error = EventError::Dispatch {
            key: "save".to_string(),
            failures: vec![
                HandlerFailure {
                    handler: Uuid::new_v4(),
                    error: "a".into(),
                },
                HandlerFailure {
                    handler: Uuid::new_v4(),
                    error: "b".into(),
                },
            ],
        };
        assert_eq!(error.to_string(), "2 handler(s) failed for event save");
    }

    #[test]
    fn test_config_error_has_no_key() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = EventError::from(parse_err);
        assert!(error.key().is_none());
    }
}
