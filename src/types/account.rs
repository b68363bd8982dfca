//! Account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Account {
    /// Account ID.
    pub id: String,

    /// Local username.
    #[serde(default)]
    pub username: String,

    /// Webfinger address (`user` for local accounts, `user@domain` otherwise).
    #[serde(default)]
    pub acct: String,

    /// Display name.
    #[serde(default)]
    pub display_name: String,

    /// Whether follow requests must be approved.
    #[serde(default)]
    pub locked: bool,

    /// Whether the account is automated.
    #[serde(default)]
    pub bot: bool,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Biography (HTML).
    #[serde(default)]
    pub note: String,

    /// Profile URL.
    #[serde(default)]
    pub url: String,

    /// Avatar image URL.
    #[serde(default)]
    pub avatar: String,

    /// Header image URL.
    #[serde(default)]
    pub header: String,

    /// Number of followers.
    #[serde(default)]
    pub followers_count: u64,

    /// Number of followed accounts.
    #[serde(default)]
    pub following_count: u64,

    /// Number of statuses.
    #[serde(default)]
    pub statuses_count: u64,

    /// Profile metadata fields.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Account {
    /// Returns true if the account lives on another instance.
    pub fn is_remote(&self) -> bool {
        self.acct.contains('@')
    }
}

/// A profile metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Field {
    /// Field label.
    pub name: String,

    /// Field value (HTML).
    #[serde(default)]
    pub value: String,

    /// When a link in the value was verified, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl Field {
    /// Returns true if the field's link was verified.
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_minimal() {
        let account: Account = serde_json::from_str(r#"{"id":"42"}"#).unwrap();
        assert_eq!(account.id, "42");
        assert!(account.fields.is_empty());
        assert!(!account.is_remote());
    }

    #[test]
    fn test_account_with_fields() {
        let account: Account = serde_json::from_str(
            r#"{
                "id": "1",
                "username": "alice",
                "acct": "alice@example.social",
                "bot": true,
                "created_at": "2019-04-01T12:00:00.000Z",
                "followers_count": 12,
                "fields": [
                    {"name": "Site", "value": "https://alice.example", "verified_at": "2020-01-01T00:00:00.000Z"},
                    {"name": "Pronouns", "value": "they/them", "verified_at": null}
                ]
            }"#,
        )
        .unwrap();

        assert!(account.is_remote());
        assert!(account.bot);
        assert_eq!(account.followers_count, 12);
        assert!(account.created_at.is_some());
        assert_eq!(account.fields.len(), 2);
        assert!(account.fields[0].is_verified());
        assert!(!account.fields[1].is_verified());
    }
}
