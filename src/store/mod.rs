//! Entity repositories.
//!
//! # Data Flow
//! ```text
//! handlers / gates
//!     → Storage (one Arc<dyn …Repository> per entity)
//!     → memory.rs (in-process tables behind one lock)
//! ```
//!
//! # Design Decisions
//! - Repositories are traits so a database-backed implementation can be
//!   swapped in without touching the gates
//! - `PostRepository::update` is the only way to change a post and is a
//!   single conditional write keyed on (id, version)
//! - "No row matched" is reported as `StoreError::NotFound` for reads and
//!   conditional writes alike

pub mod memory;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use models::{
    Comment, FeedItem, FeedQuery, NewComment, NewPost, NewUser, Post, PostUpdate, SortOrder, User,
    UserCredentials,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,
    #[error("a user with that email already exists")]
    DuplicateEmail,
    #[error("a user with that username already exists")]
    DuplicateUsername,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<crate::resilience::DeadlineExceeded> for StoreError {
    fn from(e: crate::resilience::DeadlineExceeded) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert an inactive user and its activation token hash.
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<User>;

    async fn get_by_id(&self, id: i64) -> StoreResult<User>;

    async fn get_credentials_by_email(&self, email: &str) -> StoreResult<UserCredentials>;

    /// Activate the user owning a live invitation. Returns its id.
    async fn activate(&self, token_hash: &str) -> StoreResult<i64>;

    async fn delete(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Level of a role by name. Unknown names are an error.
    async fn level_of(&self, name: &str) -> StoreResult<i32>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: NewPost) -> StoreResult<Post>;

    async fn get(&self, id: i64) -> StoreResult<Post>;

    /// Apply `update` iff the stored version equals `update.version`, in the
    /// same atomic write that merges the changed fields. Returns the stored
    /// row at the new version (old + 1), or `NotFound` when no row matched.
    async fn update(&self, update: &PostUpdate) -> StoreResult<Post>;

    async fn delete(&self, id: i64) -> StoreResult<Post>;

    async fn feed(&self, viewer_id: i64, query: &FeedQuery) -> StoreResult<Vec<FeedItem>>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: NewComment) -> StoreResult<Comment>;

    /// Comments on a post, newest first.
    async fn list_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>>;

    async fn delete_for_post(&self, post_id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait FollowerRepository: Send + Sync {
    /// Idempotent.
    async fn follow(&self, follower_id: i64, followee_id: i64) -> StoreResult<()>;

    /// Idempotent.
    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> StoreResult<()>;
}

/// The set of repositories the API talks to.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub followers: Arc<dyn FollowerRepository>,
}

impl Storage {
    /// Back every repository with the same in-memory store.
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            roles: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            followers: store,
        }
    }
}
