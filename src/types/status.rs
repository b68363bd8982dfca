//! Status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::Account;
use super::common::{Mention, Tag};

/// Who can see a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone, shown in public timelines.
    #[default]
    Public,
    /// Visible to everyone, hidden from public timelines.
    Unlisted,
    /// Followers only.
    Private,
    /// Mentioned accounts only.
    Direct,
    /// A visibility this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A status (post).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Status {
    /// Status ID.
    pub id: String,

    /// ActivityPub URI.
    #[serde(default)]
    pub uri: String,

    /// HTML permalink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Body (HTML).
    #[serde(default)]
    pub content: String,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,

    /// Visibility.
    #[serde(default)]
    pub visibility: Visibility,

    /// Whether the media is marked sensitive.
    #[serde(default)]
    pub sensitive: bool,

    /// Content warning.
    #[serde(default)]
    pub spoiler_text: String,

    /// ID of the status this replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<String>,

    /// ID of the account this replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_account_id: Option<String>,

    /// The boosted status, if this is a boost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblog: Option<Box<Status>>,

    /// Number of boosts.
    #[serde(default)]
    pub reblogs_count: u64,

    /// Number of favourites.
    #[serde(default)]
    pub favourites_count: u64,

    /// Number of replies.
    #[serde(default)]
    pub replies_count: u64,

    /// ISO 639 language code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Mentioned accounts.
    #[serde(default)]
    pub mentions: Vec<Mention>,

    /// Hashtags.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Status {
    /// Returns true if this status is a boost of another.
    pub fn is_reblog(&self) -> bool {
        self.reblog.is_some()
    }

    /// Returns true if this status is a reply.
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }

    /// Returns true if the status carries the given hashtag (case-insensitive).
    pub fn has_tag(&self, name: &str) -> bool {
        let name = name.trim_start_matches('#');
        self.tags.iter().any(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Identifier of a status deleted on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeletedStatus(pub String);

impl DeletedStatus {
    /// Returns the status ID.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeletedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_id() {
        let status: Status = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert_eq!(status.id, "1");
        assert_eq!(status.visibility, Visibility::Public);
        assert!(!status.is_reblog());
    }

    #[test]
    fn test_status_requires_id() {
        assert!(serde_json::from_str::<Status>(r#"{"content":"hi"}"#).is_err());
    }

    #[test]
    fn test_status_full() {
        let status: Status = serde_json::from_str(
            r##"{
                "id": "103704874086360371",
                "uri": "https://example.social/users/alice/statuses/103704874086360371",
                "content": "<p>hello #rust</p>",
                "created_at": "2020-02-22T20:26:16.000Z",
                "visibility": "unlisted",
                "in_reply_to_id": "1",
                "account": {"id": "7", "username": "alice"},
                "tags": [{"name": "Rust", "url": "https://example.social/tags/rust"}],
                "reblog": {"id": "99"}
            }"##,
        )
        .unwrap();

        assert_eq!(status.visibility, Visibility::Unlisted);
        assert!(status.is_reply());
        assert!(status.is_reblog());
        assert!(status.has_tag("#rust"));
        assert_eq!(status.account.map(|a| a.username), Some("alice".to_string()));
    }

    #[test]
    fn test_unknown_visibility() {
        let status: Status =
            serde_json::from_str(r#"{"id":"1","visibility":"local_only"}"#).unwrap();
        assert_eq!(status.visibility, Visibility::Unknown);
    }

    #[test]
    fn test_deleted_status_display() {
        let deleted = DeletedStatus("123".to_string());
        assert_eq!(deleted.id(), "123");
        assert_eq!(deleted.to_string(), "123");
    }
}
