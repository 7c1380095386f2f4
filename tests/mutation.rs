//! Optimistic concurrency on PATCH /v1/posts/{id}.

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{send, test_config, TestApp, TestRequest};

async fn post_at_version(app: &TestApp, token: &str, version: i64) -> i64 {
    let res = app
        .send(
            TestRequest::post("/v1/posts")
                .bearer(token)
                .json(json!({ "title": "draft", "content": "v0" }))
                .build(),
        )
        .await;
    let id = res.data()["id"].as_i64().unwrap();
    for v in 0..version {
        let res = app
            .send(
                TestRequest::patch(format!("/v1/posts/{id}"))
                    .bearer(token)
                    .json(json!({ "content": format!("v{}", v + 1), "version": v }))
                    .build(),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }
    id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_patches_from_same_version() {
    let app = TestApp::new(test_config());
    let (_, token) = app.user("writer_account", "user");
    let id = post_at_version(&app, &token, 3).await;

    let tasks: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|title| {
            let router = app.router.clone();
            let request = TestRequest::patch(format!("/v1/posts/{id}"))
                .bearer(&token)
                .json(json!({ "title": title, "version": 3 }))
                .build();
            tokio::spawn(async move { send(&router, request).await })
        })
        .collect();

    let mut ok = Vec::new();
    let mut conflicts = 0;
    for task in tasks {
        let res = task.await.unwrap();
        match res.status {
            StatusCode::OK => ok.push(res.data()["version"].as_i64().unwrap()),
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, vec![4]);
    assert_eq!(conflicts, 1);

    let res = app
        .send(TestRequest::get(format!("/v1/posts/{id}")).bearer(&token).build())
        .await;
    assert_eq!(res.data()["version"], json!(4));
}

#[tokio::test]
async fn test_stale_version_conflicts_and_is_not_retried() {
    let app = TestApp::new(test_config());
    let (_, token) = app.user("writer_account", "user");
    let id = post_at_version(&app, &token, 2).await;

    let res = app
        .send(
            TestRequest::patch(format!("/v1/posts/{id}"))
                .bearer(&token)
                .json(json!({ "title": "late", "version": 1 }))
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert!(res.error().starts_with("edit conflict"));

    let res = app
        .send(TestRequest::get(format!("/v1/posts/{id}")).bearer(&token).build())
        .await;
    assert_eq!(res.data()["version"], json!(2));
    assert_eq!(res.data()["title"], json!("draft"));
}

#[tokio::test]
async fn test_patch_without_version_uses_loaded_version() {
    let app = TestApp::new(test_config());
    let (_, token) = app.user("writer_account", "user");
    let id = post_at_version(&app, &token, 1).await;

    let res = app
        .send(
            TestRequest::patch(format!("/v1/posts/{id}"))
                .bearer(&token)
                .json(json!({ "title": "renamed" }))
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["version"], json!(2));
    assert_eq!(res.data()["title"], json!("renamed"));
    assert_eq!(res.data()["content"], json!("v1"));
}

#[tokio::test]
async fn test_patch_validation() {
    let app = TestApp::new(test_config());
    let (_, token) = app.user("writer_account", "user");
    let id = post_at_version(&app, &token, 0).await;
    let path = format!("/v1/posts/{id}");

    let res = app
        .send(TestRequest::patch(&path).bearer(&token).json(json!({ "version": 0 })).build())
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .send(
            TestRequest::patch(&path)
                .bearer(&token)
                .json(json!({ "title": "x".repeat(101) }))
                .build(),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}
