use crate::error::ResizeError;
use serde::{Deserialize, Serialize};

/// Event-type family accepted by the resizer
const OBJECT_CREATED: &str = "ObjectCreated";

/// One object notification from an inbound batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Event type name, e.g. `ObjectCreated:Put`
    pub event_name: String,
    /// Object key as delivered: percent-encoded, `+` for space
    pub key: Option<String>,
}

impl Notification {
    pub fn new(event_name: impl Into<String>, key: Option<&str>) -> Self {
        Self {
            event_name: event_name.into(),
            key: key.map(String::from),
        }
    }

    /// Event-type family: everything before the first `:`
    pub fn event_family(&self) -> &str {
        self.event_name
            .split(':')
            .next()
            .unwrap_or_default()
    }
}

/// Decode an object key from a notification
///
/// Percent-escapes are decoded first, then every literal `+` becomes a space.
pub fn decode_key(raw: &str) -> Result<String, ResizeError> {
    let decoded = urlencoding::decode(raw).map_err(|e| {
        ResizeError::InvalidEvent(format!("key is not valid UTF-8 after decoding: {e}"))
    })?;

    Ok(decoded.replace('+', " "))
}

/// Validate a notification and return its decoded object key
pub fn validate(notification: &Notification) -> Result<String, ResizeError> {
    let key = match notification.key.as_deref() {
        Some(raw) if !raw.is_empty() => decode_key(raw)?,
        _ => return Err(ResizeError::InvalidEvent("missing key".to_string())),
    };

    if notification.event_family() != OBJECT_CREATED {
        return Err(ResizeError::UnsupportedEvent {
            event_name: notification.event_name.clone(),
        });
    }

    Ok(key)
}
