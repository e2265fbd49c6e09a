/// Author profile handler
use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::post_repo::PostFilter;
use crate::error::Result;
use crate::handlers::{get_user_or_404, post_page, render};
use crate::middleware::CurrentUser;
use crate::models::{AuthorRef, PostView};
use crate::pagination::{Page, PageQuery};
use crate::services::FollowService;

#[derive(Debug, Serialize)]
pub struct ProfileContext {
    pub author: AuthorRef,
    pub post_count: i64,
    /// Whether the viewer follows this author; false for anonymous viewers
    pub following: bool,
    pub page_obj: Page<PostView>,
}

pub async fn profile(
    pool: web::Data<SqlitePool>,
    viewer: Option<CurrentUser>,
    username: web::Path<String>,
    query: PageQuery,
) -> Result<HttpResponse> {
    let author = get_user_or_404(&pool, &username).await?;

    let page_obj = post_page(&pool, PostFilter::Author(author.id), query.requested()).await?;

    let following = match viewer {
        Some(viewer) => {
            FollowService::new((**pool).clone())
                .is_following(viewer.id, author.id)
                .await?
        }
        None => false,
    };

    Ok(render(&ProfileContext {
        author: AuthorRef::from(&author),
        post_count: page_obj.count,
        following,
        page_obj,
    }))
}
