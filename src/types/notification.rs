//! Notification types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::Account;
use super::status::Status;

/// A notification for the authenticated user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    /// Notification ID.
    pub id: String,

    /// Notification type (`mention`, `reblog`, `favourite`, `follow`, ...).
    ///
    /// Kept as a string since servers add new types over time.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// The account that caused the notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,

    /// The status involved, for status-related types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl Notification {
    /// Does this notification include a status?
    ///
    /// An explicit `"status": null` counts as no status, the same as a
    /// missing key.
    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }
}
