/// Blog Service Library
///
/// A blogging platform: authors publish posts (optionally in a group and with
/// an image), readers comment and follow authors, and followers get a feed of
/// the authors they follow.
///
/// # Modules
///
/// - `handlers`: HTTP handlers rendering JSON page contexts
/// - `models`: Data structures for users, groups, posts, comments, follows
/// - `services`: Business logic layer
/// - `db`: Repositories and migrations
/// - `forms`: Form input and validation
/// - `pagination`: Page-number pagination of listings
/// - `cache`: Response page cache
/// - `media`: Uploaded image storage
/// - `auth`: Session token validation
/// - `middleware`: Authentication, CSRF and metrics middleware
/// - `error`: Error types and error pages
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod media;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::middleware::ErrorHandlers;
use actix_web::{web, App};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::JwtKeys;
use crate::cache::PageCache;
use crate::config::MediaConfig;
use crate::handlers::{comments, follows, groups, pages, posts, profile};
use crate::media::{LocalMediaStorage, MediaStorage};
use crate::middleware::{AuthMiddleware, AuthSettings, MetricsMiddleware};

pub const SERVICE_NAME: &str = "blog-service";

/// Multipart bodies also carry the text fields next to the upload.
const FORM_OVERHEAD_BYTES: usize = 256 * 1024;

/// Shared application state, cloned into every worker
#[derive(Clone)]
pub struct AppState {
    pub pool: web::Data<SqlitePool>,
    pub cache: web::Data<PageCache>,
    pub media: web::Data<Arc<dyn MediaStorage>>,
    pub media_config: web::Data<MediaConfig>,
    pub jwt_keys: web::Data<JwtKeys>,
    pub auth_settings: web::Data<AuthSettings>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        let media: Arc<dyn MediaStorage> = Arc::new(LocalMediaStorage::new(&config.media.root));
        Self::with_media(pool, config, media)
    }

    pub fn with_media(pool: SqlitePool, config: &Config, media: Arc<dyn MediaStorage>) -> Self {
        Self {
            pool: web::Data::new(pool),
            cache: web::Data::new(PageCache::with_limits(
                Duration::from_secs(config.cache.page_ttl_secs),
                config.cache.max_entries,
            )),
            media: web::Data::new(media),
            media_config: web::Data::new(config.media.clone()),
            jwt_keys: web::Data::new(JwtKeys::new(
                &config.auth.jwt_secret,
                config.auth.token_expiry_secs,
            )),
            auth_settings: web::Data::new(AuthSettings {
                login_url: config.auth.login_url.clone(),
            }),
        }
    }

    /// Register shared state and every route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.pool.clone())
            .app_data(self.cache.clone())
            .app_data(self.media.clone())
            .app_data(self.media_config.clone())
            .app_data(self.jwt_keys.clone())
            .app_data(self.auth_settings.clone())
            .app_data(web::PayloadConfig::new(
                self.media_config.max_upload_bytes + FORM_OVERHEAD_BYTES,
            ));
        routes(cfg);
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(posts::index))
        .route("/group/{slug}/", web::get().to(groups::group_posts))
        .route("/profile/{username}/", web::get().to(profile::profile))
        .service(
            web::resource("/profile/{username}/follow/")
                .route(web::get().to(follows::profile_follow))
                .route(web::post().to(follows::profile_follow)),
        )
        .service(
            web::resource("/profile/{username}/unfollow/")
                .route(web::get().to(follows::profile_unfollow))
                .route(web::post().to(follows::profile_unfollow)),
        )
        .route("/posts/{post_id}/", web::get().to(posts::post_detail))
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(posts::post_edit_form))
                .route(web::post().to(posts::post_edit)),
        )
        .route(
            "/posts/{post_id}/comment/",
            web::post().to(comments::add_comment),
        )
        .service(
            web::resource("/create/")
                .route(web::get().to(posts::post_create_form))
                .route(web::post().to(posts::post_create)),
        )
        .route("/follow/", web::get().to(follows::follow_index))
        .route("/health", web::get().to(pages::health))
        .route("/metrics", web::get().to(metrics::serve_metrics));
}

/// Application with state, routes, error pages and middleware
pub fn build_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .configure(|cfg| state.configure(cfg))
        .default_service(web::to(pages::not_found))
        .wrap(ErrorHandlers::new().handler(StatusCode::NOT_FOUND, pages::render_not_found))
        .wrap(AuthMiddleware)
        .wrap(MetricsMiddleware)
        .wrap(tracing_actix_web::TracingLogger::default())
}
