/// Error pages and service endpoints
use actix_web::body::EitherBody;
use actix_web::dev::ServiceResponse;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::SqlitePool;

use crate::SERVICE_NAME;

fn not_found_page(path: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": "not_found",
        "status": 404,
        "path": path,
    }))
}

/// Fallback for unknown routes
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    not_found_page(req.path())
}

/// Rewrite every 404 into the not-found page carrying the request path.
pub fn render_not_found<B>(
    res: ServiceResponse<B>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let (req, _) = res.into_parts();
    let response = not_found_page(req.path());
    let res: ServiceResponse<EitherBody<B>> =
        ServiceResponse::new(req, response).map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}

/// Liveness plus a database round trip
pub async fn health(pool: web::Data<SqlitePool>) -> HttpResponse {
    let check = async {
        let mut conn = db_pool::acquire_with_metrics(&pool, SERVICE_NAME).await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok::<_, sqlx::Error>(())
    };

    match check.await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "error": format!("database check failed: {}", e),
                "service": SERVICE_NAME,
            }))
        }
    }
}
