//! Mapping from decoded frames to typed events.

use crate::errors::MalformedEventError;
use crate::types::{DeletedStatus, Notification, Status};

/// Event type carrying a new or edited status.
pub const EVENT_UPDATE: &str = "update";
/// Event type carrying a notification.
pub const EVENT_NOTIFICATION: &str = "notification";
/// Event type carrying the ID of a deleted status.
pub const EVENT_DELETE: &str = "delete";

/// A typed streaming event.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A status appeared on the timeline.
    Status(Box<Status>),
    /// A notification for the authenticated user.
    Notification(Box<Notification>),
    /// A status was deleted.
    Delete(DeletedStatus),
    /// An event type this client does not map. Never delivered.
    Ignored,
}

impl DomainEvent {
    /// Returns the wire event type this variant is decoded from.
    pub fn event_type(&self) -> Option<&'static str> {
        match self {
            DomainEvent::Status(_) => Some(EVENT_UPDATE),
            DomainEvent::Notification(_) => Some(EVENT_NOTIFICATION),
            DomainEvent::Delete(_) => Some(EVENT_DELETE),
            DomainEvent::Ignored => None,
        }
    }

    /// Is this event dropped before delivery?
    pub fn is_ignored(&self) -> bool {
        matches!(self, DomainEvent::Ignored)
    }
}

/// Classifies one frame.
///
/// `delete` payloads are the bare status ID, not JSON. Unknown event types
/// map to [`DomainEvent::Ignored`] so that new server events do not break
/// existing clients.
pub fn classify(event_type: &str, payload: &[u8]) -> Result<DomainEvent, MalformedEventError> {
    match event_type {
        EVENT_UPDATE => serde_json::from_slice::<Status>(payload)
            .map(|status| DomainEvent::Status(Box::new(status)))
            .map_err(|e| MalformedEventError::new(event_type, e.to_string())),
        EVENT_NOTIFICATION => serde_json::from_slice::<Notification>(payload)
            .map(|notification| DomainEvent::Notification(Box::new(notification)))
            .map_err(|e| MalformedEventError::new(event_type, e.to_string())),
        EVENT_DELETE => {
            let id = std::str::from_utf8(payload)
                .map_err(|e| MalformedEventError::new(event_type, e.to_string()))?
                .trim();
            if id.is_empty() {
                return Err(MalformedEventError::new(event_type, "empty status id"));
            }
            Ok(DomainEvent::Delete(DeletedStatus(id.to_string())))
        }
        _ => Ok(DomainEvent::Ignored),
    }
}
