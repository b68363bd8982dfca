//! Type definitions for the Mastodon API.
//!
//! Serde models for the entities delivered by the streaming API and returned
//! by the REST primitives. Only `id` is required on each entity; every other
//! field falls back to its default so that sparse payloads still decode.

pub mod account;
pub mod common;
pub mod notification;
pub mod status;

pub use account::{Account, Field};
pub use common::{Mention, Tag};
pub use notification::Notification;
pub use status::{DeletedStatus, Status, Visibility};
