/// HTTP handlers
///
/// Every page answers with its JSON page context (the data a template would
/// receive), a redirect, or an error page.
pub mod comments;
pub mod follows;
pub mod groups;
pub mod pages;
pub mod posts;
pub mod profile;

use actix_web::{http::header, HttpResponse};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{post_repo, post_repo::PostFilter, user_repo};
use crate::error::{AppError, Result};
use crate::models::{PostView, User};
use crate::pagination::{paginate, Page};

/// 200 with the page context
pub(crate) fn render<T: Serialize>(context: &T) -> HttpResponse {
    HttpResponse::Ok().json(context)
}

pub(crate) fn redirect(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.as_ref()))
        .finish()
}

pub(crate) fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub(crate) fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

/// One page of posts matching `filter`, newest first
pub(crate) async fn post_page(
    pool: &SqlitePool,
    filter: PostFilter,
    requested: Option<&str>,
) -> Result<Page<PostView>> {
    let count = post_repo::count_posts(pool, filter).await?;
    let page = paginate(count, requested, |limit, offset| {
        post_repo::list_posts(pool, filter, limit, offset)
    })
    .await?;
    Ok(page)
}

pub(crate) async fn get_user_or_404(pool: &SqlitePool, username: &str) -> Result<User> {
    user_repo::find_user_by_username(pool, username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", username)))
}
