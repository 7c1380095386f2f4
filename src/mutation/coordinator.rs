//! Optimistic-concurrency updates of posts.

use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::store::{Post, PostRepository, PostUpdate, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// The stored version moved on (or the post is gone).
    #[error("post {id} changed since version {version}")]
    Conflict { id: i64, version: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MutationCoordinator {
    posts: Arc<dyn PostRepository>,
    deadline: Duration,
}

impl MutationCoordinator {
    pub fn new(posts: Arc<dyn PostRepository>, deadline: Duration) -> Self {
        Self { posts, deadline }
    }

    /// Apply `update` if the post is still at `update.version`. Returns the
    /// new version.
    pub async fn update(&self, update: PostUpdate) -> Result<i64, MutationError> {
        self.apply(update).await.map(|post| post.version)
    }

    /// Like `update`, returning the post as stored at the new version.
    pub async fn apply(&self, update: PostUpdate) -> Result<Post, MutationError> {
        let outcome = with_deadline(self.deadline, self.posts.update(&update))
            .await
            .map_err(StoreError::from)?;

        match outcome {
            Ok(post) => {
                tracing::info!(post_id = post.id, version = post.version, "Post updated");
                Ok(post)
            }
            Err(StoreError::NotFound) => {
                tracing::warn!(
                    post_id = update.id,
                    expected_version = update.version,
                    "Version conflict"
                );
                metrics::record_version_conflict();
                Err(MutationError::Conflict {
                    id: update.id,
                    version: update.version,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
