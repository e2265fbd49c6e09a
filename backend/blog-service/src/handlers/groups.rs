/// Group listing handler
use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{group_repo, post_repo::PostFilter};
use crate::error::{AppError, Result};
use crate::handlers::{post_page, render};
use crate::models::{Group, PostView};
use crate::pagination::{Page, PageQuery};

#[derive(Debug, Serialize)]
pub struct GroupPostsContext {
    pub group: Group,
    pub page_obj: Page<PostView>,
}

pub async fn group_posts(
    pool: web::Data<SqlitePool>,
    slug: web::Path<String>,
    query: PageQuery,
) -> Result<HttpResponse> {
    let slug = slug.into_inner();
    let group = group_repo::find_group_by_slug(&pool, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("group {}", slug)))?;

    let page_obj = post_page(&pool, PostFilter::Group(group.id), query.requested()).await?;

    Ok(render(&GroupPostsContext { group, page_obj }))
}
