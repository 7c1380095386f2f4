//! Comments, follows, feed and operator routes.

use axum::http::{header, StatusCode};
use serde_json::json;

mod common;
use common::{test_config, TestApp, TestRequest, BASIC_PASSWORD, BASIC_USER};

async fn create_post(app: &TestApp, token: &str, title: &str, tags: &[&str]) -> i64 {
    let res = app
        .send(
            TestRequest::post("/v1/posts")
                .bearer(token)
                .json(json!({
                    "title": title,
                    "content": format!("{title} content"),
                    "tags": tags
                }))
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    res.data()["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_comments_show_on_post_newest_first() {
    let app = TestApp::new(test_config());
    let (_, token) = app.user("author_account", "user");
    let id = create_post(&app, &token, "Commented", &[]).await;

    for text in ["first!", "second"] {
        let res = app
            .send(
                TestRequest::post("/v1/comments")
                    .bearer(&token)
                    .json(json!({ "post_id": id, "comment": text }))
                    .build(),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.data()["username"], json!("author_account"));
    }

    let res = app
        .send(TestRequest::get(format!("/v1/posts/{id}")).bearer(&token).build())
        .await;
    let comments = res.data()["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["comment"], json!("second"));

    let res = app
        .send(
            TestRequest::post("/v1/comments")
                .bearer(&token)
                .json(json!({ "post_id": 4242, "comment": "into the void" }))
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feed_follows_and_filters() {
    let app = TestApp::new(test_config());
    let (_, me) = app.user("reader_account", "user");
    let (author, theirs) = app.user("writer_account", "user");
    let (_, stranger) = app.user("stranger_account", "user");

    create_post(&app, &me, "My rust notes", &["rust"]).await;
    create_post(&app, &theirs, "Axum tips", &["rust", "web"]).await;
    create_post(&app, &stranger, "Unrelated", &["rust"]).await;

    let feed = |query: &str| TestRequest::get(format!("/v1/users/feed{query}")).bearer(&me).build();

    let res = app.send(feed("")).await;
    assert_eq!(res.data().as_array().unwrap().len(), 1);

    let res = app
        .send(TestRequest::put(format!("/v1/users/{}/follow", author.id)).bearer(&me).build())
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.send(feed("")).await;
    let titles: Vec<_> = res
        .data()
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("Axum tips"), json!("My rust notes")]);
    assert_eq!(res.data()[0]["username"], json!("writer_account"));
    assert_eq!(res.data()[0]["comment_count"], json!(0));

    let res = app.send(feed("?sort=asc&limit=1")).await;
    assert_eq!(res.data()[0]["title"], json!("My rust notes"));

    let res = app.send(feed("?tags=rust,web")).await;
    assert_eq!(res.data().as_array().unwrap().len(), 1);

    let res = app.send(feed("?search=AXUM")).await;
    assert_eq!(res.data()[0]["title"], json!("Axum tips"));

    assert_eq!(app.send(feed("?limit=0")).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.send(feed("?limit=abc")).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.send(feed("?sort=random")).await.status, StatusCode::BAD_REQUEST);

    let res = app
        .send(TestRequest::put(format!("/v1/users/{}/unfollow", author.id)).bearer(&me).build())
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(app.send(feed("")).await.data().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_user_profile_and_self_follow() {
    let app = TestApp::new(test_config());
    let (me, token) = app.user("reader_account", "user");

    let res = app
        .send(TestRequest::get(format!("/v1/users/{}", me.id)).bearer(&token).build())
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["username"], json!("reader_account"));
    assert!(res.data().get("password_hash").is_none());

    let res = app
        .send(TestRequest::put(format!("/v1/users/{}/follow", me.id)).bearer(&token).build())
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.send(TestRequest::get("/v1/users/777").bearer(&token).build()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_is_public_and_tagged_with_request_id() {
    let app = TestApp::new(test_config());
    let res = app.send(TestRequest::get("/v1/health").build()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], json!("ok"));
    assert_eq!(res.data()["env"], json!("test"));
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_admin_routes_require_basic_credentials() {
    let mut config = test_config();
    config.cache.enabled = true;
    let app = TestApp::new(config);

    let res = app.send(TestRequest::get("/v1/admin/status").build()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.headers.contains_key(header::WWW_AUTHENTICATE));

    let res = app
        .send(TestRequest::get("/v1/admin/status").basic(BASIC_USER, "wrong").build())
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // A bearer token is not an operator credential.
    let (_, token) = app.user("admin_account", "admin");
    let res = app.send(TestRequest::get("/v1/admin/status").bearer(&token).build()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .send(TestRequest::get("/v1/admin/status").basic(BASIC_USER, BASIC_PASSWORD).build())
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], json!("operational"));

    let res = app
        .send(TestRequest::get("/v1/admin/limiter").basic(BASIC_USER, BASIC_PASSWORD).build())
        .await;
    assert_eq!(res.data()["max_requests"], json!(10_000));
    assert!(res.data()["tracked_clients"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_admin_cache_and_user_deletion() {
    let mut config = test_config();
    config.cache.enabled = true;
    let app = TestApp::new(config);
    let (user, token) = app.user("doomed_account", "user");

    // Populate the cache through authentication.
    app.send(TestRequest::get("/v1/users/feed").bearer(&token).build()).await;
    let res = app
        .send(TestRequest::get("/v1/admin/cache").basic(BASIC_USER, BASIC_PASSWORD).build())
        .await;
    assert_eq!(res.data(), &json!({ "backend": "memory", "entries": 1 }));

    let res = app
        .send(
            TestRequest::delete(format!("/v1/admin/users/{}", user.id))
                .basic(BASIC_USER, BASIC_PASSWORD)
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    // Gone from the cache, so the token no longer resolves.
    let res = app.send(TestRequest::get("/v1/users/feed").bearer(&token).build()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .send(
            TestRequest::delete(format!("/v1/admin/users/{}", user.id))
                .basic(BASIC_USER, BASIC_PASSWORD)
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .send(TestRequest::delete("/v1/admin/cache").basic(BASIC_USER, BASIC_PASSWORD).build())
        .await;
    assert_eq!(res.data(), &json!({ "removed": 0 }));
}
