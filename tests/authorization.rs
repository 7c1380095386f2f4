//! Owner bypass and role levels on post routes.

use axum::http::StatusCode;
use serde_json::json;

use social_api::store::User;

mod common;
use common::{test_config, TestApp, TestRequest};

async fn create_post(app: &TestApp, token: &str) -> i64 {
    let res = app
        .send(
            TestRequest::post("/v1/posts")
                .bearer(token)
                .json(json!({ "title": "A post", "content": "Body text" }))
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    res.data()["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_role_levels_against_post_policy() {
    let app = TestApp::new(test_config());
    let (_, owner) = app.user("owner_account", "user");
    let (_, plain) = app.user("plain_account", "user");
    let (_, moderator) = app.user("moderator_account", "moderator");
    let (_, admin) = app.user("admin_account", "admin");
    let id = create_post(&app, &owner).await;
    let path = format!("/v1/posts/{id}");

    // read: moderator
    let res = app.send(TestRequest::get(&path).bearer(&plain).build()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.error(), "not permitted");
    let res = app.send(TestRequest::get(&path).bearer(&moderator).build()).await;
    assert_eq!(res.status, StatusCode::OK);

    // update: moderator
    let edit = json!({ "title": "moderated" });
    let res = app.send(TestRequest::patch(&path).bearer(&plain).json(edit.clone()).build()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app.send(TestRequest::patch(&path).bearer(&moderator).json(edit).build()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["title"], json!("moderated"));

    // delete: admin
    let res = app.send(TestRequest::delete(&path).bearer(&moderator).build()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app.send(TestRequest::delete(&path).bearer(&admin).build()).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    let res = app.send(TestRequest::get(&path).bearer(&admin).build()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_passes_every_gate() {
    let app = TestApp::new(test_config());
    let (_, owner) = app.user("owner_account", "user");
    let id = create_post(&app, &owner).await;
    let path = format!("/v1/posts/{id}");

    let res = app.send(TestRequest::get(&path).bearer(&owner).build()).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = app
        .send(TestRequest::patch(&path).bearer(&owner).json(json!({ "content": "mine" })).build())
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let res = app.send(TestRequest::delete(&path).bearer(&owner).build()).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
}

/// A cached identity can name a role the role store does not know.
fn with_role(user: &User, role: &str) -> User {
    User {
        role: role.to_string(),
        ..user.clone()
    }
}

#[tokio::test]
async fn test_owner_with_unknown_role_is_allowed() {
    let (app, cache) = TestApp::with_memory_cache(test_config());
    let (owner, token) = app.user("owner_account", "user");
    let id = create_post(&app, &token).await;

    cache.set(&with_role(&owner, "ghost")).await;
    let res = app
        .send(TestRequest::delete(format!("/v1/posts/{id}")).bearer(&token).build())
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_non_owner_with_unknown_role_is_a_server_error() {
    let (app, cache) = TestApp::with_memory_cache(test_config());
    let (_, owner_token) = app.user("owner_account", "user");
    let (other, other_token) = app.user("other_account", "admin");
    let id = create_post(&app, &owner_token).await;

    cache.set(&with_role(&other, "ghost")).await;
    let res = app
        .send(TestRequest::get(format!("/v1/posts/{id}")).bearer(&other_token).build())
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_role_level_is_read_per_request() {
    let app = TestApp::new(test_config());
    let (_, owner) = app.user("owner_account", "user");
    let (_, reader) = app.user("reader_account", "user");
    let id = create_post(&app, &owner).await;
    let path = format!("/v1/posts/{id}");

    let res = app.send(TestRequest::get(&path).bearer(&reader).build()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    app.store.upsert_role("user", 2).unwrap();
    let res = app.send(TestRequest::get(&path).bearer(&reader).build()).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_post_context_errors() {
    let app = TestApp::new(test_config());
    let (_, token) = app.user("someone_here", "admin");

    let res = app.send(TestRequest::get("/v1/posts/12345").bearer(&token).build()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.send(TestRequest::get("/v1/posts/abc").bearer(&token).build()).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    // Authentication still runs first.
    let res = app.send(TestRequest::get("/v1/posts/12345").build()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
