/// Post handlers - listing, detail, create and edit
use actix_multipart::Multipart;
use actix_web::http::header::ContentType;
use actix_web::{web, Either, HttpRequest, HttpResponse};
use bytes::Bytes;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::cache::PageCache;
use crate::config::MediaConfig;
use crate::db::{comment_repo, group_repo, post_repo, post_repo::PostFilter};
use crate::error::{AppError, Result};
use crate::forms::{CommentFormContext, PostFormContext, PostFormInput};
use crate::handlers::{post_page, post_url, profile_url, redirect, render};
use crate::media::MediaStorage;
use crate::middleware::{check_post_update, CurrentUser};
use crate::models::{CommentView, PostView};
use crate::pagination::{Page, PageQuery};
use crate::services::{PostService, Submission};

/// Post forms arrive urlencoded (text only) or as multipart with an image.
pub type PostFormPayload = Either<web::Form<PostFormInput>, Multipart>;

#[derive(Debug, Serialize)]
pub struct IndexContext {
    pub page_obj: Page<PostView>,
}

#[derive(Debug, Serialize)]
pub struct PostDetailContext {
    pub post: PostView,
    pub post_count: i64,
    pub comments: Vec<CommentView>,
    pub form: CommentFormContext,
}

#[derive(Debug, Serialize)]
pub struct PostFormPageContext {
    pub form: PostFormContext,
    pub is_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
}

pub(crate) async fn read_post_form(
    payload: PostFormPayload,
    media: &MediaConfig,
) -> Result<PostFormInput> {
    match payload {
        Either::Left(form) => Ok(form.into_inner()),
        Either::Right(multipart) => {
            PostFormInput::from_multipart(multipart, media.max_upload_bytes).await
        }
    }
}

/// Index: all posts, served through the page cache
pub async fn index(
    req: HttpRequest,
    pool: web::Data<SqlitePool>,
    cache: web::Data<PageCache>,
    query: PageQuery,
) -> Result<HttpResponse> {
    let key = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.path().to_string());

    let body = cache
        .get_or_try_insert_with(&key, || async {
            let page_obj = post_page(&pool, PostFilter::All, query.requested()).await?;
            let rendered = serde_json::to_vec(&IndexContext { page_obj })?;
            Ok::<_, AppError>(Bytes::from(rendered))
        })
        .await?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body))
}

/// Build the detail context; `form` carries a rejected comment if any.
pub(crate) async fn post_detail_context(
    pool: &SqlitePool,
    post_id: i64,
    form: CommentFormContext,
) -> Result<PostDetailContext> {
    let post = post_repo::find_post_view(pool, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

    let post_count = post_repo::count_posts_by_author(pool, post.author.id).await?;
    let comments = comment_repo::list_comments_for_post(pool, post_id).await?;

    Ok(PostDetailContext {
        post,
        post_count,
        comments,
        form,
    })
}

pub async fn post_detail(
    pool: web::Data<SqlitePool>,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let context =
        post_detail_context(&pool, post_id.into_inner(), CommentFormContext::default()).await?;
    Ok(render(&context))
}

pub async fn post_create_form(
    pool: web::Data<SqlitePool>,
    _user: CurrentUser,
) -> Result<HttpResponse> {
    let groups = group_repo::list_groups(&pool).await?;
    Ok(render(&PostFormPageContext {
        form: PostFormContext::empty(&groups),
        is_edit: false,
        post_id: None,
    }))
}

pub async fn post_create(
    pool: web::Data<SqlitePool>,
    media: web::Data<Arc<dyn MediaStorage>>,
    media_config: web::Data<MediaConfig>,
    user: CurrentUser,
    payload: PostFormPayload,
) -> Result<HttpResponse> {
    let input = read_post_form(payload, &media_config).await?;
    let groups = group_repo::list_groups(&pool).await?;

    let service = PostService::new((**pool).clone(), media.get_ref().clone());
    match service.create_post(user.id, &input, &groups).await? {
        Submission::Accepted(_) => Ok(redirect(profile_url(&user.username))),
        Submission::Rejected(errors) => Ok(render(&PostFormPageContext {
            form: PostFormContext::bound(&groups, &input, None, errors),
            is_edit: false,
            post_id: None,
        })),
    }
}

pub async fn post_edit_form(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    let post = post_repo::find_post_by_id(&pool, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

    if check_post_update(user.id, &post).is_err() {
        return Ok(redirect(post_url(post_id)));
    }

    let groups = group_repo::list_groups(&pool).await?;
    Ok(render(&PostFormPageContext {
        form: PostFormContext::initial(&groups, &post.text, post.group_id, post.image.as_deref()),
        is_edit: true,
        post_id: Some(post_id),
    }))
}

pub async fn post_edit(
    pool: web::Data<SqlitePool>,
    media: web::Data<Arc<dyn MediaStorage>>,
    media_config: web::Data<MediaConfig>,
    user: CurrentUser,
    post_id: web::Path<i64>,
    payload: PostFormPayload,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    let post = post_repo::find_post_by_id(&pool, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

    if let Err(e) = check_post_update(user.id, &post) {
        tracing::debug!(post_id, user_id = user.id, error = %e, "Edit by non-author ignored");
        return Ok(redirect(post_url(post_id)));
    }

    let input = read_post_form(payload, &media_config).await?;
    let groups = group_repo::list_groups(&pool).await?;

    let service = PostService::new((**pool).clone(), media.get_ref().clone());
    match service.update_post(&post, &input, &groups).await? {
        Submission::Accepted(_) => Ok(redirect(post_url(post_id))),
        Submission::Rejected(errors) => Ok(render(&PostFormPageContext {
            form: PostFormContext::bound(&groups, &input, post.image.as_deref(), errors),
            is_edit: true,
            post_id: Some(post_id),
        })),
    }
}
