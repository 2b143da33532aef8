use crate::event::Notification;
use thiserror::Error;

/// Errors raised while processing a single notification
#[derive(Debug, Error)]
pub enum ResizeError {
    /// The notification carries no usable object key
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The notification is not an object-creation event
    #[error("unsupported event type: {event_name}")]
    UnsupportedEvent { event_name: String },

    /// The source object is not a readable image
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Resizing or re-encoding a derivative failed
    #[error("transform failed: {0}")]
    Transform(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Object store access errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("access denied: {key}")]
    AccessDenied { key: String },

    /// Presumed transient; safe to redeliver
    #[error("storage error: {0}")]
    Transient(String),
}

/// A failed batch, carrying the original records so the platform can redeliver them
#[derive(Debug, Error)]
#[error("failed to process batch of {} record(s): {source}", .records.len())]
pub struct BatchFailure {
    #[source]
    pub source: ResizeError,
    pub records: Vec<Notification>,
}

impl ResizeError {
    /// Short machine-readable kind, used as a log field and metric label
    pub fn kind(&self) -> &'static str {
        match self {
            ResizeError::InvalidEvent(_) => "invalid_event",
            ResizeError::UnsupportedEvent { .. } => "unsupported_event",
            ResizeError::Decode(_) => "decode",
            ResizeError::Transform(_) => "transform",
            ResizeError::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failure_message_counts_records() {
        let failure = BatchFailure {
            source: ResizeError::Decode("truncated header".to_string()),
            records: vec![
                Notification::new("ObjectCreated:Put", Some("a.jpg")),
                Notification::new("ObjectCreated:Put", Some("b.jpg")),
            ],
        };

        let message = failure.to_string();
        assert!(message.contains("2 record(s)"));
        assert!(message.contains("truncated header"));
    }

    #[test]
    fn test_storage_error_converts() {
        let err: ResizeError = StorageError::NotFound {
            key: "photos/a.jpg".to_string(),
        }
        .into();

        assert_eq!(err.kind(), "storage");
        assert_eq!(err.to_string(), "object not found: photos/a.jpg");
    }
}
