//! Entities exchanged with the repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. Serialized flat; this is also the cache payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    /// Role name. The level is looked up in the role store when needed.
    pub role: String,
}

/// A user together with its stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Fields required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// A post. `version` is the optimistic concurrency token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub version: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// A conditional write: applied only while the stored version equals `version`.
/// Fields left `None` keep the value stored at that version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUpdate {
    pub id: i64,
    pub version: i64,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub user_id: i64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub post: Post,
    pub username: String,
    pub comment_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters and paging for a user's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub limit: usize,
    pub offset: usize,
    pub sort: SortOrder,
    /// A post must carry every tag listed here.
    pub tags: Vec<String>,
    /// Case-insensitive substring of title or content.
    pub search: String,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            sort: SortOrder::Desc,
            tags: Vec::new(),
            search: String::new(),
        }
    }
}
