use shared::{CreatePostRequest, Post};
use tracing::info;

use crate::db::DbConnection;
use crate::error::AppError;

/// Operations on posts; a user owns any number of them.
#[derive(Clone)]
pub struct PostService {
    db: DbConnection,
}

impl PostService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// All posts for a user, newest first. A user with no posts yields an
    /// empty list, not an error.
    pub async fn list_by_user_id(&self, user_id: i64) -> Result<Vec<Post>, AppError> {
        self.ensure_user(user_id).await?;

        let posts = self.db.list_posts_by_user(user_id).await?;
        info!("Found {} posts for user {}", posts.len(), user_id);
        Ok(posts)
    }

    pub async fn create_post(&self, request: CreatePostRequest) -> Result<Post, AppError> {
        self.ensure_user(request.user_id).await?;

        let post = self.db.insert_post(&request).await?;
        info!("Created post {} for user {}", post.id, post.user_id);
        Ok(post)
    }

    pub async fn delete_post(&self, id: i64) -> Result<(), AppError> {
        self.db
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post with ID {id} not found")))?;

        self.db.delete_post(id).await?;
        info!("Deleted post {}", id);
        Ok(())
    }

    async fn ensure_user(&self, user_id: i64) -> Result<(), AppError> {
        if self.db.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("User with ID {user_id} not found")))
        }
    }
}
