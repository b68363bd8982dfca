//! Streaming topics.

use super::request::QueryParams;

/// A logical feed that a streaming subscription requests.
///
/// Each variant resolves to exactly one path under `/api/v1/streaming/` and a
/// fixed set of query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamTopic {
    /// Home timeline and notifications of the authenticated user.
    User,
    /// Public statuses from the local instance.
    LocalTimeline,
    /// Public statuses carrying a hashtag.
    Hashtag(String),
    /// Local public statuses carrying a hashtag.
    LocalHashtag(String),
    /// Statuses from a list, by list ID.
    List(String),
    /// All public statuses known to the instance.
    Firehose,
}

impl StreamTopic {
    /// Path of the topic, relative to the streaming namespace.
    pub fn path(&self) -> &'static str {
        match self {
            StreamTopic::User => "user",
            StreamTopic::LocalTimeline => "public/local",
            StreamTopic::Hashtag(_) => "hashtag",
            StreamTopic::LocalHashtag(_) => "hashtag/local",
            StreamTopic::List(_) => "list",
            StreamTopic::Firehose => "public",
        }
    }

    /// Query parameters selecting the topic.
    pub fn query(&self) -> QueryParams {
        let mut params = QueryParams::new();
        match self {
            StreamTopic::Hashtag(tag) | StreamTopic::LocalHashtag(tag) => {
                params.insert("tag", tag.clone());
            }
            StreamTopic::List(id) => {
                params.insert("list", id.clone());
            }
            StreamTopic::User | StreamTopic::LocalTimeline | StreamTopic::Firehose => {}
        }
        params
    }
}

impl std::fmt::Display for StreamTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamTopic::Hashtag(tag) | StreamTopic::LocalHashtag(tag) => {
                write!(f, "{}#{}", self.path(), tag)
            }
            StreamTopic::List(id) => write!(f, "list:{id}"),
            _ => f.write_str(self.path()),
        }
    }
}
