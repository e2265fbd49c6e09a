/// Database access layer
///
/// Repositories are free functions over a `SqlitePool`, one module per table.
/// Deletes of parent rows run in a single transaction that removes dependent
/// rows first, so integrity does not hinge on the `foreign_keys` pragma.
use sqlx::{
    migrate::{MigrateError, Migrator},
    SqlitePool,
};

pub mod comment_repo;
pub mod follow_repo;
pub mod group_repo;
pub mod post_repo;
pub mod user_repo;

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    db_pool::migrate(pool, &MIGRATOR).await
}
