mod common;

use blog_service::db::{comment_repo, follow_repo, group_repo, post_repo, user_repo};

use common::setup;

#[actix_web::test]
async fn deleting_group_removes_its_posts_and_comments() {
    let ctx = setup().await;
    let author = ctx.user("auth").await;
    let group = ctx.group("doomed").await;
    let in_group = ctx.post(&author, "in group", Some(&group)).await;
    let outside = ctx.post(&author, "outside", None).await;
    comment_repo::create_comment(&ctx.pool, in_group.id, author.id, "c1")
        .await
        .unwrap();
    comment_repo::create_comment(&ctx.pool, outside.id, author.id, "c2")
        .await
        .unwrap();

    assert!(group_repo::delete_group(&ctx.pool, group.id).await.unwrap());

    assert!(post_repo::find_post_by_id(&ctx.pool, in_group.id)
        .await
        .unwrap()
        .is_none());
    assert!(post_repo::find_post_by_id(&ctx.pool, outside.id)
        .await
        .unwrap()
        .is_some());
    assert_eq!(comment_repo::count_comments(&ctx.pool).await.unwrap(), 1);
    assert!(!group_repo::delete_group(&ctx.pool, group.id).await.unwrap());
}

#[actix_web::test]
async fn deleting_user_removes_everything_they_own() {
    let ctx = setup().await;
    let doomed = ctx.user("doomed").await;
    let other = ctx.user("other").await;
    let own_post = ctx.post(&doomed, "mine", None).await;
    let other_post = ctx.post(&other, "theirs", None).await;

    comment_repo::create_comment(&ctx.pool, own_post.id, other.id, "on doomed post")
        .await
        .unwrap();
    comment_repo::create_comment(&ctx.pool, other_post.id, doomed.id, "by doomed")
        .await
        .unwrap();
    comment_repo::create_comment(&ctx.pool, other_post.id, other.id, "survives")
        .await
        .unwrap();
    follow_repo::create_follow(&ctx.pool, doomed.id, other.id)
        .await
        .unwrap();
    follow_repo::create_follow(&ctx.pool, other.id, doomed.id)
        .await
        .unwrap();

    assert!(user_repo::delete_user(&ctx.pool, doomed.id).await.unwrap());

    assert!(user_repo::find_user_by_id(&ctx.pool, doomed.id)
        .await
        .unwrap()
        .is_none());
    assert!(post_repo::find_post_by_id(&ctx.pool, own_post.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(comment_repo::count_comments(&ctx.pool).await.unwrap(), 1);
    assert_eq!(follow_repo::count_follows(&ctx.pool).await.unwrap(), 0);
}

#[actix_web::test]
async fn deleting_post_removes_its_comments() {
    let ctx = setup().await;
    let author = ctx.user("auth").await;
    let post = ctx.post(&author, "text", None).await;
    comment_repo::create_comment(&ctx.pool, post.id, author.id, "c")
        .await
        .unwrap();

    assert!(post_repo::delete_post(&ctx.pool, post.id).await.unwrap());
    assert_eq!(
        comment_repo::count_comments_for_post(&ctx.pool, post.id)
            .await
            .unwrap(),
        0
    );
}

#[actix_web::test]
async fn follow_pair_is_unique() {
    let ctx = setup().await;
    let a = ctx.user("a").await;
    let b = ctx.user("b").await;

    assert!(follow_repo::create_follow(&ctx.pool, a.id, b.id).await.unwrap());
    assert!(!follow_repo::create_follow(&ctx.pool, a.id, b.id).await.unwrap());
    assert!(follow_repo::create_follow(&ctx.pool, b.id, a.id).await.unwrap());
    assert_eq!(follow_repo::count_follows(&ctx.pool).await.unwrap(), 2);

    let edge = follow_repo::find_follow(&ctx.pool, a.id, b.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((edge.user_id, edge.author_id), (a.id, b.id));
}

#[actix_web::test]
async fn usernames_are_unique() {
    let ctx = setup().await;
    ctx.user("taken").await;
    assert!(user_repo::create_user(&ctx.pool, "taken").await.is_err());
}
