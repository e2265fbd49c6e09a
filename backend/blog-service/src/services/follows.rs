/// Follow service - subscriptions between users
use crate::db::follow_repo;
use crate::error::{AppError, Result};
use crate::metrics::record_mutation;
use crate::models::User;
use sqlx::SqlitePool;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Users cannot follow themselves; nothing is written
    SelfFollowIgnored,
}

pub struct FollowService {
    pool: SqlitePool,
}

impl FollowService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get-or-create the follow edge from `user_id` to `author`
    pub async fn follow(&self, user_id: i64, author: &User) -> Result<FollowOutcome> {
        if user_id == author.id {
            debug!(user_id, "Ignoring self-follow");
            return Ok(FollowOutcome::SelfFollowIgnored);
        }

        if follow_repo::create_follow(&self.pool, user_id, author.id).await? {
            record_mutation("follow");
            info!(user_id, author_id = author.id, "Follow created");
            Ok(FollowOutcome::Created)
        } else {
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    /// Remove the follow edge; NotFound when it does not exist
    pub async fn unfollow(&self, user_id: i64, author: &User) -> Result<()> {
        if !follow_repo::delete_follow(&self.pool, user_id, author.id).await? {
            return Err(AppError::NotFound(format!(
                "follow of {} not found",
                author.username
            )));
        }

        record_mutation("unfollow");
        info!(user_id, author_id = author.id, "Follow removed");
        Ok(())
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool> {
        Ok(follow_repo::is_following(&self.pool, user_id, author_id).await?)
    }
}
