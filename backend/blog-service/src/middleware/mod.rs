/// HTTP middleware for blog-service
///
/// `AuthMiddleware` resolves the session token into an optional
/// `CurrentUser` and enforces the CSRF double-submit check for
/// cookie-authenticated writes. `MetricsMiddleware` records request counts
/// and latency.
pub mod permissions;

pub use permissions::*;

use actix_web::body::EitherBody;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures_util::future::LocalBoxFuture;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use std::future::{ready, Ready};
use std::rc::Rc;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::{debug, warn};

use crate::auth::JwtKeys;
use crate::db::user_repo;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

pub const SESSION_COOKIE: &str = "session_token";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Login page settings, shared through `web::Data`
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub login_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_url: "/auth/login/".to_string(),
        }
    }
}

// =====================================================================
// Session authentication
// =====================================================================

/// Authenticated user stored in request extensions by `AuthMiddleware`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Header,
    Cookie,
}

fn extract_token(req: &ServiceRequest) -> Option<(String, TokenSource)> {
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some((token, TokenSource::Header));
    }

    req.cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| (t, TokenSource::Cookie))
}

/// Double-submit check: the `X-CSRFToken` header must echo the cookie.
fn verify_csrf(req: &ServiceRequest) -> Result<(), AppError> {
    let cookie = req
        .cookie(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::CsrfFailure("CSRF cookie not set.".to_string()))?;

    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::CsrfFailure("CSRF token missing.".to_string()))?;

    if header != cookie {
        return Err(AppError::CsrfFailure("CSRF token incorrect.".to_string()));
    }
    Ok(())
}

fn new_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Validate `token` and load the account it names. Tokens that fail
/// validation or name a deleted account yield `None`.
async fn resolve_session(
    keys: &JwtKeys,
    pool: &SqlitePool,
    token: &str,
) -> Result<Option<CurrentUser>, sqlx::Error> {
    let claims = match keys.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "Rejected session token");
            return Ok(None);
        }
    };

    let Ok(user_id) = claims.sub.parse::<i64>() else {
        warn!(sub = %claims.sub, "Token subject is not a user id");
        return Ok(None);
    };

    match user_repo::find_user_by_id(pool, user_id).await? {
        Some(user) => Ok(Some(CurrentUser {
            id: user.id,
            username: user.username,
        })),
        None => {
            warn!(user_id, "Session token for unknown user");
            Ok(None)
        }
    }
}

/// Actix middleware that resolves session tokens into a `CurrentUser`.
///
/// Missing, invalid or expired tokens, and tokens of deleted accounts, leave
/// the request anonymous; protected handlers then redirect to the login page
/// through the `CurrentUser` extractor.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let keys = req.app_data::<web::Data<JwtKeys>>().cloned();
            let pool = req.app_data::<web::Data<SqlitePool>>().cloned();
            let mut source = None;

            if let (Some(keys), Some(pool), Some((token, token_source))) =
                (keys, pool, extract_token(&req))
            {
                match resolve_session(&keys, &pool, &token).await {
                    Ok(Some(user)) => {
                        req.extensions_mut().insert(user);
                        source = Some(token_source);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let response = AppError::from(e).error_response();
                        return Ok(req.into_response(response).map_into_right_body());
                    }
                }
            }

            let cookie_session = source == Some(TokenSource::Cookie);

            if cookie_session && !req.method().is_safe() {
                if let Err(err) = verify_csrf(&req) {
                    debug!(path = %req.path(), error = %err, "CSRF check failed");
                    let response = err.error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            }

            let needs_csrf_cookie = cookie_session && req.cookie(CSRF_COOKIE).is_none();
            let mut res = service.call(req).await?;

            if needs_csrf_cookie {
                let cookie = Cookie::build(CSRF_COOKIE, new_csrf_token())
                    .path("/")
                    .same_site(SameSite::Lax)
                    .finish();
                if let Err(e) = res.response_mut().add_cookie(&cookie) {
                    warn!(error = %e, "Failed to set CSRF cookie");
                }
            }

            Ok(res.map_into_left_body())
        })
    }
}

impl FromRequest for CurrentUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = req.extensions().get::<CurrentUser>().cloned().ok_or_else(|| {
            let login_url = req
                .app_data::<web::Data<AuthSettings>>()
                .map(|s| s.login_url.clone())
                .unwrap_or_else(|| AuthSettings::default().login_url);
            let next = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| req.path().to_string());

            AppError::Unauthenticated { login_url, next }.into()
        });

        ready(result)
    }
}

// =====================================================================
// Metrics middleware
// =====================================================================

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let path = req.path().to_string();
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await;
            let elapsed = start.elapsed();

            let (route, status) = match &res {
                Ok(res) => (
                    res.request()
                        .match_pattern()
                        .unwrap_or_else(|| "unmatched".to_string()),
                    res.status().as_u16().to_string(),
                ),
                Err(err) => (
                    "unmatched".to_string(),
                    err.as_response_error().status_code().as_u16().to_string(),
                ),
            };

            HTTP_REQUESTS_TOTAL
                .with_label_values(&[method.as_str(), route.as_str(), status.as_str()])
                .inc();
            HTTP_REQUEST_DURATION_SECONDS
                .with_label_values(&[method.as_str(), route.as_str()])
                .observe(elapsed.as_secs_f64());

            debug!(%method, %path, %status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
            res
        })
    }
}
