//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use base64::Engine;
use serde_json::Value;
use tower::ServiceExt;

use social_api::cache::{CacheBackend, MemoryBackend, UserCache};
use social_api::config::AppConfig;
use social_api::http::{build_router, AppState};
use social_api::store::{MemoryStore, Storage, User};

pub const BASIC_USER: &str = "ops";
pub const BASIC_PASSWORD: &str = "ops-password";

/// Config suited to tests: cheap bcrypt, generous rate limit.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.env = "test".into();
    config.rate_limit.max_requests = 10_000;
    config.auth.bcrypt_cost = 4;
    config.auth.jwt.secret = "integration-test-secret-0123456789".into();
    config.auth.basic.username = BASIC_USER.into();
    config.auth.basic.password = BASIC_PASSWORD.into();
    config
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, Storage::in_memory(store.clone()));
        Self::from_parts(state, store)
    }

    /// App whose identity cache is a live in-memory cache the test can reach.
    pub fn with_memory_cache(config: AppConfig) -> (Self, Arc<UserCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(UserCache::new(
            CacheBackend::Memory(MemoryBackend::new()),
            Duration::from_secs(600),
            Duration::from_secs(30),
            Duration::from_secs(5),
        ));
        let state = AppState::with_cache(config, Storage::in_memory(store.clone()), cache.clone());
        (Self::from_parts(state, store), cache)
    }

    fn from_parts(state: AppState, store: Arc<MemoryStore>) -> Self {
        Self {
            router: build_router(state.clone()),
            state,
            store,
        }
    }

    /// An active user with `role` and a valid token for it.
    pub fn user(&self, username: &str, role: &str) -> (User, String) {
        let user = self
            .store
            .seed_user(username, &format!("{username}@example.com"), "unused", role, true)
            .unwrap();
        let token = self.state.authenticator.tokens.issue(user.id).unwrap();
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Request builder that fills in what the listener would: the peer address.
pub struct TestRequest {
    method: Method,
    uri: String,
    peer: SocketAddr,
    headers: Vec<(header::HeaderName, String)>,
    body: Option<Value>,
}

impl TestRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            peer: "127.0.0.1:40000".parse().unwrap(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(Method::PUT, uri)
    }

    pub fn patch(uri: impl Into<String>) -> Self {
        Self::new(Method::PATCH, uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn peer(mut self, peer: &str) -> Self {
        self.peer = peer.parse().unwrap();
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION, format!("Bearer {token}"))
    }

    pub fn basic(self, username: &str, password: &str) -> Self {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        self.header(header::AUTHORIZATION, format!("Basic {encoded}"))
    }

    pub fn header(mut self, name: header::HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        let body = match self.body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let mut request = builder.body(body).unwrap();
        request.extensions_mut().insert(ConnectInfo(self.peer));
        request
    }
}
