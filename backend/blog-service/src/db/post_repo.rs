use crate::models::{Post, PostView, PostViewRow};
use chrono::Utc;
use sqlx::SqlitePool;

const POST_COLUMNS: &str = "id, text, pub_date, author_id, group_id, image";

const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.image,
           u.id AS author_id, u.username AS author_username,
           g.id AS group_id, g.title AS group_title, g.slug AS group_slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

/// Which posts a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by authors the given user follows
    FollowedBy(i64),
}

impl PostFilter {
    fn condition(&self) -> &'static str {
        match self {
            PostFilter::All => "1 = 1",
            PostFilter::Group(_) => "p.group_id = ?",
            PostFilter::Author(_) => "p.author_id = ?",
            PostFilter::FollowedBy(_) => {
                "p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)"
            }
        }
    }

    fn argument(&self) -> Option<i64> {
        match *self {
            PostFilter::All => None,
            PostFilter::Group(id) | PostFilter::Author(id) | PostFilter::FollowedBy(id) => Some(id),
        }
    }
}

/// Fields a post form writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Create a post; `pub_date` is stamped here and never changes afterwards
pub async fn create_post(
    pool: &SqlitePool,
    author_id: i64,
    changes: &PostChanges,
) -> Result<Post, sqlx::Error> {
    let sql = format!(
        "INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (?, ?, ?, ?, ?) RETURNING {}",
        POST_COLUMNS
    );

    let post = sqlx::query_as::<_, Post>(&sql)
        .bind(&changes.text)
        .bind(Utc::now())
        .bind(author_id)
        .bind(changes.group_id)
        .bind(changes.image.as_deref())
        .fetch_one(pool)
        .await?;

    Ok(post)
}

pub async fn find_post_by_id(pool: &SqlitePool, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    sqlx::query_as::<_, Post>(&sql)
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// Find a post joined with its author and group
pub async fn find_post_view(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Option<PostView>, sqlx::Error> {
    let sql = format!("{} WHERE p.id = ?", POST_VIEW_SELECT);
    let row = sqlx::query_as::<_, PostViewRow>(&sql)
        .bind(post_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(PostView::from))
}

/// Overwrite the editable fields of a post
pub async fn update_post(
    pool: &SqlitePool,
    post_id: i64,
    changes: &PostChanges,
) -> Result<Option<Post>, sqlx::Error> {
    let sql = format!(
        "UPDATE posts SET text = ?, group_id = ?, image = ? WHERE id = ? RETURNING {}",
        POST_COLUMNS
    );

    sqlx::query_as::<_, Post>(&sql)
        .bind(&changes.text)
        .bind(changes.group_id)
        .bind(changes.image.as_deref())
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// Delete a post and its comments in one transaction
pub async fn delete_post(pool: &SqlitePool, post_id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_posts(pool: &SqlitePool, filter: PostFilter) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM posts p WHERE {}", filter.condition());
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    if let Some(argument) = filter.argument() {
        query = query.bind(argument);
    }
    query.fetch_one(pool).await
}

/// One slice of a listing, newest first (ties broken by id)
pub async fn list_posts(
    pool: &SqlitePool,
    filter: PostFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostView>, sqlx::Error> {
    let sql = format!(
        "{} WHERE {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_VIEW_SELECT,
        filter.condition()
    );

    let mut query = sqlx::query_as::<_, PostViewRow>(&sql);
    if let Some(argument) = filter.argument() {
        query = query.bind(argument);
    }

    let rows = query.bind(limit).bind(offset).fetch_all(pool).await?;
    Ok(rows.into_iter().map(PostView::from).collect())
}

/// Number of posts written by an author
pub async fn count_posts_by_author(pool: &SqlitePool, author_id: i64) -> Result<i64, sqlx::Error> {
    count_posts(pool, PostFilter::Author(author_id)).await
}
