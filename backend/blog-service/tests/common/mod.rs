//! Shared fixtures for blog-service integration tests.
//!
//! Every test gets a private in-memory database with migrations applied and
//! its own temporary media root.
#![allow(dead_code)]

use actix_web::http::header;
use blog_service::config::{
    AppConfig, AuthConfig, CacheConfig, DatabaseConfig, LoggingConfig, MediaConfig,
};
use blog_service::db::{group_repo, post_repo, run_migrations, user_repo};
use blog_service::models::{Group, Post, User};
use blog_service::{AppState, Config};
use db_pool::{create_pool, DbConfig};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const LOGIN_URL: &str = "/auth/login/";

/// 2x1 GIF
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const BOUNDARY: &str = "----blogservicetestboundary";

pub struct TestContext {
    pub pool: SqlitePool,
    pub state: AppState,
    pub config: Config,
    pub media_dir: TempDir,
}

pub fn test_config(media_root: &std::path::Path) -> Config {
    Config {
        app: AppConfig {
            env: "test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            workers: 1,
        },
        database: DatabaseConfig {
            url: db_pool::IN_MEMORY_URL.into(),
        },
        media: MediaConfig {
            root: media_root.to_path_buf(),
            max_upload_bytes: 1024 * 1024,
        },
        cache: CacheConfig {
            page_ttl_secs: 20,
            max_entries: 1024,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret".into(),
            token_expiry_secs: 3600,
            login_url: LOGIN_URL.into(),
        },
        logging: LoggingConfig { json: false },
    }
}

pub async fn setup() -> TestContext {
    let pool = create_pool(DbConfig::in_memory("blog-service-test"))
        .await
        .expect("create in-memory pool");
    run_migrations(&pool).await.expect("run migrations");

    let media_dir = tempfile::tempdir().expect("media dir");
    let config = test_config(media_dir.path());
    let state = AppState::new(pool.clone(), &config);

    TestContext {
        pool,
        state,
        config,
        media_dir,
    }
}

impl TestContext {
    pub async fn user(&self, username: &str) -> User {
        user_repo::create_user(&self.pool, username)
            .await
            .expect("create user")
    }

    pub async fn group(&self, slug: &str) -> Group {
        group_repo::create_group(&self.pool, &format!("Group {}", slug), slug, "test group")
            .await
            .expect("create group")
    }

    pub async fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        let changes = post_repo::PostChanges {
            text: text.to_string(),
            group_id: group.map(|g| g.id),
            image: None,
        };
        post_repo::create_post(&self.pool, author.id, &changes)
            .await
            .expect("create post")
    }

    pub fn token(&self, user: &User) -> String {
        self.state.jwt_keys.issue_token(user).expect("issue token")
    }

    /// `Authorization` header for `user`
    pub fn bearer(&self, user: &User) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", self.token(user)))
    }
}

/// Body and content type of a multipart form; `file` is (field, filename, bytes).
pub fn multipart_body(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/gif\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn location(resp: &actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
