use crate::models::Group;
use sqlx::SqlitePool;

pub async fn create_group(
    pool: &SqlitePool,
    title: &str,
    slug: &str,
    description: &str,
) -> Result<Group, sqlx::Error> {
    let group = sqlx::query_as::<_, Group>(
        r#"
        INSERT INTO post_groups (title, slug, description)
        VALUES (?, ?, ?)
        RETURNING id, title, slug, description
        "#,
    )
    .bind(title)
    .bind(slug)
    .bind(description)
    .fetch_one(pool)
    .await?;

    Ok(group)
}

pub async fn find_group_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM post_groups WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

/// All groups ordered by title, used for form choices
pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(
        "SELECT id, title, slug, description FROM post_groups ORDER BY title ASC, id ASC",
    )
    .fetch_all(pool)
    .await
}

/// Delete a group together with its posts and their comments
pub async fn delete_group(pool: &SqlitePool, group_id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE group_id = ?)")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM posts WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM post_groups WHERE id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}
