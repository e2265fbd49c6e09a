/// Follow handlers - subscription feed, follow and unfollow
use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::post_repo::PostFilter;
use crate::error::Result;
use crate::handlers::{get_user_or_404, post_page, profile_url, redirect, render};
use crate::middleware::CurrentUser;
use crate::models::PostView;
use crate::pagination::{Page, PageQuery};
use crate::services::FollowService;

#[derive(Debug, Serialize)]
pub struct FollowFeedContext {
    pub page_obj: Page<PostView>,
}

/// Posts by every author the current user follows
pub async fn follow_index(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
    query: PageQuery,
) -> Result<HttpResponse> {
    let page_obj = post_page(&pool, PostFilter::FollowedBy(user.id), query.requested()).await?;
    Ok(render(&FollowFeedContext { page_obj }))
}

pub async fn profile_follow(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let author = get_user_or_404(&pool, &username).await?;
    FollowService::new((**pool).clone())
        .follow(user.id, &author)
        .await?;
    Ok(redirect(profile_url(&author.username)))
}

pub async fn profile_unfollow(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let author = get_user_or_404(&pool, &username).await?;
    FollowService::new((**pool).clone())
        .unfollow(user.id, &author)
        .await?;
    Ok(redirect(profile_url(&author.username)))
}
