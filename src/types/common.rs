//! Small value types shared across entities.

use serde::{Deserialize, Serialize};

/// An account mentioned in a status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Mention {
    /// Account ID.
    pub id: String,

    /// Username of the mentioned account.
    #[serde(default)]
    pub username: String,

    /// Webfinger address (`user` or `user@domain`).
    #[serde(default)]
    pub acct: String,

    /// Profile URL.
    #[serde(default)]
    pub url: String,
}

/// A hashtag used in a status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Tag {
    /// Hashtag name, without the leading `#`.
    pub name: String,

    /// URL of the hashtag timeline.
    #[serde(default)]
    pub url: String,
}
