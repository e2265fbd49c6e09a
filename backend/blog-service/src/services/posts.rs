/// Post service - validates post forms and persists posts with their images
use crate::db::post_repo::{self, PostChanges};
use crate::error::Result;
use crate::forms::{CleanedPost, ImageChange, PostFormInput};
use crate::media::MediaStorage;
use crate::metrics::record_mutation;
use crate::models::{Group, Post};
use crate::services::Submission;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct PostService {
    pool: SqlitePool,
    media: Arc<dyn MediaStorage>,
}

impl PostService {
    pub fn new(pool: SqlitePool, media: Arc<dyn MediaStorage>) -> Self {
        Self { pool, media }
    }

    /// Store a replacement image, or work out what stays in the column.
    async fn resolve_image(&self, change: ImageChange, current: Option<&str>) -> Result<Option<String>> {
        match change {
            ImageChange::Keep => Ok(current.map(str::to_string)),
            ImageChange::Clear => Ok(None),
            ImageChange::Replace(upload) => {
                let stored = self.media.save(&upload.filename, upload.bytes).await?;
                Ok(Some(stored))
            }
        }
    }

    async fn changes(&self, cleaned: CleanedPost, current_image: Option<&str>) -> Result<PostChanges> {
        let image = self.resolve_image(cleaned.image, current_image).await?;
        Ok(PostChanges {
            text: cleaned.text,
            group_id: cleaned.group_id,
            image,
        })
    }

    /// Validate and create a post authored by `author_id`
    pub async fn create_post(
        &self,
        author_id: i64,
        input: &PostFormInput,
        groups: &[Group],
    ) -> Result<Submission<Post>> {
        let cleaned = match input.clean(groups) {
            Ok(cleaned) => cleaned,
            Err(errors) => return Ok(Submission::Rejected(errors)),
        };

        let changes = self.changes(cleaned, None).await?;
        let post = post_repo::create_post(&self.pool, author_id, &changes).await?;

        record_mutation("post_created");
        tracing::info!(post_id = post.id, author_id, "Post created");

        Ok(Submission::Accepted(post))
    }

    /// Validate and apply an edit; ownership is checked by the caller.
    pub async fn update_post(
        &self,
        post: &Post,
        input: &PostFormInput,
        groups: &[Group],
    ) -> Result<Submission<Post>> {
        let cleaned = match input.clean(groups) {
            Ok(cleaned) => cleaned,
            Err(errors) => return Ok(Submission::Rejected(errors)),
        };

        let changes = self.changes(cleaned, post.image.as_deref()).await?;
        let updated = post_repo::update_post(&self.pool, post.id, &changes)
            .await?
            .ok_or_else(|| crate::error::AppError::NotFound(format!("post {}", post.id)))?;

        record_mutation("post_updated");
        tracing::info!(post_id = post.id, "Post updated");

        Ok(Submission::Accepted(updated))
    }
}
