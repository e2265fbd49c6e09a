/// Comment handler
use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::db::{comment_repo, post_repo};
use crate::error::{AppError, Result};
use crate::forms::{CommentFormContext, CommentFormInput};
use crate::handlers::posts::post_detail_context;
use crate::handlers::{post_url, redirect, render};
use crate::metrics::record_mutation;
use crate::middleware::CurrentUser;

/// Add a comment; an invalid form re-renders the post detail with errors.
pub async fn add_comment(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
    post_id: web::Path<i64>,
    form: web::Form<CommentFormInput>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    if post_repo::find_post_by_id(&pool, post_id).await?.is_none() {
        return Err(AppError::NotFound(format!("post {}", post_id)));
    }

    match form.clean() {
        Ok(text) => {
            let comment = comment_repo::create_comment(&pool, post_id, user.id, &text).await?;
            record_mutation("comment_created");
            tracing::info!(comment_id = comment.id, post_id, user_id = user.id, "Comment created");
            Ok(redirect(post_url(post_id)))
        }
        Err(errors) => {
            let context =
                post_detail_context(&pool, post_id, CommentFormContext::bound(&form, errors))
                    .await?;
            Ok(render(&context))
        }
    }
}
