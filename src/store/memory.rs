//! In-process implementation of every repository.
//!
//! All tables sit behind one `RwLock`, so each repository call is atomic with
//! respect to every other call. That is what makes `PostRepository::update`
//! a true compare-and-swap.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    Comment, CommentRepository, FeedItem, FeedQuery, FollowerRepository, NewComment, NewPost,
    NewUser, Post, PostRepository, PostUpdate, RoleRepository, SortOrder, StoreError, StoreResult,
    User, UserCredentials, UserRepository,
};

/// Roles seeded into every new store, lowest first.
pub const DEFAULT_ROLES: [(&str, i32); 3] = [("user", 1), ("moderator", 2), ("admin", 3)];

struct UserRow {
    user: User,
    password_hash: String,
}

struct Invitation {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

struct CommentRow {
    id: i64,
    post_id: i64,
    user_id: i64,
    comment: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, UserRow>,
    /// sha256(token) -> invitation
    invitations: HashMap<String, Invitation>,
    roles: HashMap<String, i32>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, CommentRow>,
    /// (follower, followee)
    follows: HashSet<(i64, i64)>,
    next_user_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
}

impl Tables {
    fn username_of(&self, user_id: i64) -> String {
        self.users
            .get(&user_id)
            .map(|row| row.user.username.clone())
            .unwrap_or_default()
    }

    fn comment_view(&self, row: &CommentRow) -> Comment {
        Comment {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            username: self.username_of(row.user_id),
            comment: row.comment.clone(),
            created_at: row.created_at,
        }
    }
}

/// Shared in-memory tables.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default roles.
    pub fn new() -> Self {
        let mut tables = Tables {
            next_user_id: 1,
            next_post_id: 1,
            next_comment_id: 1,
            ..Default::default()
        };
        for (name, level) in DEFAULT_ROLES {
            tables.roles.insert(name.to_string(), level);
        }
        Self {
            tables: RwLock::new(tables),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going away (or coming back).
    /// While unavailable every call fails with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert a user directly, bypassing registration. Used for bootstrap
    /// accounts and tests.
    pub fn seed_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        is_active: bool,
    ) -> StoreResult<User> {
        let mut tables = self.write()?;
        if !tables.roles.contains_key(role) {
            return Err(StoreError::UnknownRole(role.to_string()));
        }
        let id = tables.next_user_id;
        tables.next_user_id += 1;
        let user = User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
            is_active,
            role: role.to_string(),
        };
        tables.users.insert(
            id,
            UserRow {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(user)
    }

    /// Add or replace a role.
    pub fn upsert_role(&self, name: &str, level: i32) -> StoreResult<()> {
        self.write()?.roles.insert(name.to_string(), level);
        Ok(())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<User> {
        let mut tables = self.write()?;
        if tables.users.values().any(|row| row.user.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if tables.users.values().any(|row| row.user.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        if !tables.roles.contains_key(&user.role) {
            return Err(StoreError::UnknownRole(user.role));
        }

        let id = tables.next_user_id;
        tables.next_user_id += 1;
        let created = User {
            id,
            username: user.username,
            email: user.email,
            created_at: Utc::now(),
            is_active: false,
            role: user.role,
        };
        tables.users.insert(
            id,
            UserRow {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        tables.invitations.insert(
            token_hash,
            Invitation {
                user_id: id,
                expires_at,
            },
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> StoreResult<User> {
        self.read()?
            .users
            .get(&id)
            .map(|row| row.user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_credentials_by_email(&self, email: &str) -> StoreResult<UserCredentials> {
        self.read()?
            .users
            .values()
            .find(|row| row.user.email == email)
            .map(|row| UserCredentials {
                user: row.user.clone(),
                password_hash: row.password_hash.clone(),
            })
            .ok_or(StoreError::NotFound)
    }

    async fn activate(&self, token_hash: &str) -> StoreResult<i64> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let user_id = match tables.invitations.get(token_hash) {
            Some(invitation) if invitation.expires_at > now => invitation.user_id,
            _ => return Err(StoreError::InvalidToken),
        };
        let row = tables.users.get_mut(&user_id).ok_or(StoreError::InvalidToken)?;
        row.user.is_active = true;
        tables.invitations.retain(|_, inv| inv.user_id != user_id);
        Ok(user_id)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.users.remove(&id).ok_or(StoreError::NotFound)?;
        tables.invitations.retain(|_, inv| inv.user_id != id);
        tables.follows.retain(|(a, b)| *a != id && *b != id);
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn level_of(&self, name: &str) -> StoreResult<i32> {
        self.read()?
            .roles
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::UnknownRole(name.to_string()))
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create(&self, post: NewPost) -> StoreResult<Post> {
        let mut tables = self.write()?;
        let id = tables.next_post_id;
        tables.next_post_id += 1;
        let now = Utc::now();
        let created = Post {
            id,
            version: 0,
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            tags: post.tags,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> StoreResult<Post> {
        self.read()?
            .posts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, update: &PostUpdate) -> StoreResult<Post> {
        let mut tables = self.write()?;
        match tables.posts.get_mut(&update.id) {
            Some(post) if post.version == update.version => {
                if let Some(title) = &update.title {
                    post.title = title.clone();
                }
                if let Some(content) = &update.content {
                    post.content = content.clone();
                }
                post.version += 1;
                post.updated_at = Utc::now();
                Ok(post.clone())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: i64) -> StoreResult<Post> {
        self.write()?.posts.remove(&id).ok_or(StoreError::NotFound)
    }

    async fn feed(&self, viewer_id: i64, query: &FeedQuery) -> StoreResult<Vec<FeedItem>> {
        let tables = self.read()?;
        let needle = query.search.to_lowercase();

        let mut posts: Vec<&Post> = tables
            .posts
            .values()
            .filter(|p| p.user_id == viewer_id || tables.follows.contains(&(viewer_id, p.user_id)))
            .filter(|p| {
                needle.is_empty()
                    || p.title.to_lowercase().contains(&needle)
                    || p.content.to_lowercase().contains(&needle)
            })
            .filter(|p| query.tags.iter().all(|tag| p.tags.contains(tag)))
            .collect();

        posts.sort_by_key(|p| (p.created_at, p.id));
        if query.sort == SortOrder::Desc {
            posts.reverse();
        }

        Ok(posts
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|post| FeedItem {
                post: post.clone(),
                username: tables.username_of(post.user_id),
                comment_count: tables
                    .comments
                    .values()
                    .filter(|c| c.post_id == post.id)
                    .count() as u64,
            })
            .collect())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.write()?;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(StoreError::NotFound);
        }
        let id = tables.next_comment_id;
        tables.next_comment_id += 1;
        let row = CommentRow {
            id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            comment: comment.comment,
            created_at: Utc::now(),
        };
        let view = tables.comment_view(&row);
        tables.comments.insert(id, row);
        Ok(view)
    }

    async fn list_for_post(&self, post_id: i64) -> StoreResult<Vec<Comment>> {
        let tables = self.read()?;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .map(|c| tables.comment_view(c))
            .collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(comments)
    }

    async fn delete_for_post(&self, post_id: i64) -> StoreResult<()> {
        self.write()?.comments.retain(|_, c| c.post_id != post_id);
        Ok(())
    }
}

#[async_trait]
impl FollowerRepository for MemoryStore {
    async fn follow(&self, follower_id: i64, followee_id: i64) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&followee_id) {
            return Err(StoreError::NotFound);
        }
        tables.follows.insert((follower_id, followee_id));
        Ok(())
    }

    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> StoreResult<()> {
        self.write()?.follows.remove(&(follower_id, followee_id));
        Ok(())
    }
}
