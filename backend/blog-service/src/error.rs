/// Error types for Blog Service
///
/// Every failure is terminal for its request. Errors are rendered as the
/// static error pages (404/403/500) or, for anonymous access to protected
/// pages, as a redirect to the login page.
use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Result type for blog-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown slug, username, post or follow
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Protected page requested without a session
    #[error("Authentication required for {next}")]
    Unauthenticated { login_url: String, next: String },

    #[error("CSRF verification failed: {0}")]
    CsrfFailure(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Media storage error: {0}")]
    Media(#[from] std::io::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Login URL carrying the original path in `next`
    pub fn login_redirect_location(login_url: &str, next: &str) -> String {
        // Slashes stay readable in the return path.
        let encoded = urlencoding::encode(next).replace("%2F", "/");
        let separator = if login_url.contains('?') { '&' } else { '?' };
        format!("{}{}next={}", login_url, separator, encoded)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) | AppError::CsrfFailure(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated { .. } => StatusCode::FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Media(_)
            | AppError::Token(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let body = match self {
            AppError::Unauthenticated { login_url, next } => {
                return HttpResponse::Found()
                    .insert_header((
                        header::LOCATION,
                        Self::login_redirect_location(login_url, next),
                    ))
                    .finish();
            }
            AppError::NotFound(detail) => json!({
                "error": "not_found",
                "status": status.as_u16(),
                "detail": detail,
            }),
            AppError::PermissionDenied(_) => json!({
                "error": "permission_denied",
                "status": status.as_u16(),
            }),
            AppError::CsrfFailure(reason) => json!({
                "error": "csrf_failure",
                "status": status.as_u16(),
                "reason": reason,
            }),
            AppError::BadRequest(detail) => json!({
                "error": "bad_request",
                "status": status.as_u16(),
                "detail": detail,
            }),
            _ => {
                tracing::error!(error = %self, "request failed");
                json!({
                    "error": "server_error",
                    "status": status.as_u16(),
                })
            }
        };

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_keeps_path_readable() {
        let location = AppError::login_redirect_location("/auth/login/", "/posts/1/comment/");
        assert_eq!(location, "/auth/login/?next=/posts/1/comment/");
    }

    #[test]
    fn login_redirect_encodes_query() {
        let location = AppError::login_redirect_location("/auth/login/", "/follow/?page=2");
        assert_eq!(location, "/auth/login/?next=/follow/%3Fpage%3D2");
    }

    #[test]
    fn unauthenticated_is_a_redirect() {
        let err = AppError::Unauthenticated {
            login_url: "/auth/login/".into(),
            next: "/create/".into(),
        };
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/auth/login/?next=/create/"
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let err = AppError::Internal("secret detail".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
