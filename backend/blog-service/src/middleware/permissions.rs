/// Ownership checks for blog content
///
/// Only the author of a post may change it. The edit view turns a failed
/// check into a redirect to the post instead of a 403 page.
use crate::error::AppError;
use crate::models::Post;

/// Result type for permission checks
pub type PermissionResult = Result<(), AppError>;

/// Check if a user owns a post
pub fn check_post_ownership(user_id: i64, post: &Post) -> PermissionResult {
    if post.author_id == user_id {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "You don't have permission to modify this post".to_string(),
        ))
    }
}

/// Verify user has access to update a post
pub fn check_post_update(user_id: i64, post: &Post) -> PermissionResult {
    check_post_ownership(user_id, post)
}
