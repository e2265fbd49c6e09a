mod common;

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::test;
use blog_service::build_app;
use blog_service::db::{comment_repo, follow_repo, user_repo};
use blog_service::middleware::{CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};
use blog_service::models::User;
use serde_json::Value;

use common::{location, setup};

#[actix_web::test]
async fn unknown_route_renders_not_found_page() {
    let ctx = setup().await;
    let app = test::init_service(build_app(ctx.state.clone())).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/unexisting_page/").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["status"], 404);
    assert_eq!(body["path"], "/unexisting_page/");
}

#[actix_web::test]
async fn health_pings_database() {
    let ctx = setup().await;
    let app = test::init_service(build_app(ctx.state.clone())).await;

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "blog-service");
}

#[actix_web::test]
async fn metrics_are_exposed() {
    let ctx = setup().await;
    let app = test::init_service(build_app(ctx.state.clone())).await;

    test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/metrics").to_request())
        .await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("blog_http_requests_total"));
    assert!(text.contains("blog_page_cache_events_total"));
}

#[actix_web::test]
async fn invalid_token_is_anonymous() {
    let ctx = setup().await;
    let app = test::init_service(build_app(ctx.state.clone())).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/follow/")
            .insert_header(("Authorization", "Bearer garbage"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[actix_web::test]
async fn token_of_deleted_user_is_anonymous() {
    let ctx = setup().await;
    let ghost = ctx.user("ghost").await;
    ctx.user("author").await;
    let bearer = ctx.bearer(&ghost);
    user_repo::delete_user(&ctx.pool, ghost.id).await.unwrap();
    let app = test::init_service(build_app(ctx.state.clone())).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/create/")
            .insert_header(bearer.clone())
            .set_form([("text", "from beyond"), ("group", "")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=/create/");

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/profile/author/follow/")
            .insert_header(bearer)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).starts_with("/auth/login/"));
    assert_eq!(follow_repo::count_follows(&ctx.pool).await.unwrap(), 0);
}

#[actix_web::test]
async fn session_username_comes_from_account() {
    let ctx = setup().await;
    let author = ctx.user("auth").await;
    let forged = User {
        username: "someone-else".to_string(),
        ..author.clone()
    };
    let token = ctx.token(&forged);
    let app = test::init_service(build_app(ctx.state.clone())).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/create/")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_form([("text", "hello"), ("group", "")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/auth/");
}

#[actix_web::test]
async fn cookie_session_post_requires_csrf_token() {
    let ctx = setup().await;
    let author = ctx.user("auth").await;
    let post = ctx.post(&author, "text", None).await;
    let token = ctx.token(&author);
    let app = test::init_service(build_app(ctx.state.clone())).await;
    let comment_url = format!("/posts/{}/comment/", post.id);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&comment_url)
            .cookie(Cookie::new(SESSION_COOKIE, token.clone()))
            .set_form([("text", "no csrf")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "csrf_failure");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&comment_url)
            .cookie(Cookie::new(SESSION_COOKIE, token.clone()))
            .cookie(Cookie::new(CSRF_COOKIE, "abc123"))
            .insert_header((CSRF_HEADER, "wrong"))
            .set_form([("text", "bad csrf")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(comment_repo::count_comments(&ctx.pool).await.unwrap(), 0);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&comment_url)
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .cookie(Cookie::new(CSRF_COOKIE, "abc123"))
            .insert_header((CSRF_HEADER, "abc123"))
            .set_form([("text", "good csrf")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(comment_repo::count_comments(&ctx.pool).await.unwrap(), 1);
}

#[actix_web::test]
async fn cookie_session_receives_csrf_cookie() {
    let ctx = setup().await;
    let author = ctx.user("auth").await;
    let token = ctx.token(&author);
    let app = test::init_service(build_app(ctx.state.clone())).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/create/")
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .response()
        .cookies()
        .any(|c| c.name() == CSRF_COOKIE && !c.value().is_empty()));
}
