//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the services every request shares (`AppState`)
//! - Create the Axum router and wire the gates in order
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Serve until shutdown, then stop background work
//!
//! # Middleware order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → Timeout → BodyLimit
//!     → request metrics → admission (rate limit)
//!     → [route] bearer auth → post / target-user context → post authorization
//!     → handler
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::cache::UserCache;
use crate::config::AppConfig;
use crate::http::context::{load_post_middleware, load_target_user_middleware};
use crate::http::handlers::{auth, comments, feed, health, posts, users};
use crate::mutation::MutationCoordinator;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::security::auth::{
    bearer_auth_middleware, Authenticator, IdentityResolver, TokenAuthority,
};
use crate::security::authorization::{post_authorization_middleware, Authorizer};
use crate::security::rate_limit::{rate_limit_middleware, FixedWindowLimiter};
use crate::store::{Storage, StoreError, StoreResult};

/// Services shared by every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Storage,
    pub limiter: Arc<FixedWindowLimiter>,
    pub cache: Arc<UserCache>,
    pub authenticator: Arc<Authenticator>,
    pub authorizer: Arc<Authorizer>,
    pub mutations: Arc<MutationCoordinator>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Storage) -> Self {
        let cache = Arc::new(UserCache::from_config(&config.cache, &config.timeouts));
        Self::with_cache(config, storage, cache)
    }

    /// Like `new`, with a caller-supplied cache.
    pub fn with_cache(config: AppConfig, storage: Storage, cache: Arc<UserCache>) -> Self {
        let deadline = config.timeouts.store_call();
        let authenticator = Authenticator::new(
            TokenAuthority::new(&config.auth.jwt),
            IdentityResolver::new(storage.users.clone(), cache.clone(), deadline),
        );

        Self {
            limiter: Arc::new(FixedWindowLimiter::from_config(&config.rate_limit)),
            authenticator: Arc::new(authenticator),
            authorizer: Arc::new(Authorizer::new(storage.roles.clone(), deadline)),
            mutations: Arc::new(MutationCoordinator::new(storage.posts.clone(), deadline)),
            cache,
            storage,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Deadline for a single repository call.
    pub fn store_deadline(&self) -> Duration {
        self.config.timeouts.store_call()
    }

    /// Run a repository call under the store-call deadline.
    pub async fn store<F, T>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        with_deadline(self.store_deadline(), call)
            .await
            .map_err(StoreError::from)?
    }
}

/// HTTP server for the social API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight
    /// requests and stop the window sweeper.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if self.state.config.rate_limit.enabled {
            self.state.limiter.start_sweeper();
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        self.state.limiter.shutdown().await;
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let public = Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/authentication/user", post(auth::register))
        .route("/v1/authentication/activate/{token}", put(auth::activate))
        .route("/v1/authentication/login", post(auth::create_token));

    let authenticated = Router::new()
        .route("/v1/posts", post(posts::create_post))
        .route("/v1/comments", post(comments::create_comment))
        .route("/v1/users/feed", get(feed::user_feed))
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth_middleware));

    // Layers added last run first: auth → load post → authorize.
    let post_routes = Router::new()
        .route(
            "/v1/posts/{id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), post_authorization_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), load_post_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth_middleware));

    let user_routes = Router::new()
        .route("/v1/users/{id}", get(users::get_user))
        .route("/v1/users/{id}/follow", put(users::follow_user))
        .route("/v1/users/{id}/unfollow", put(users::unfollow_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), load_target_user_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth_middleware));

    let mut router = Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(post_routes)
        .merge(user_routes);

    if config.admin.enabled {
        router = router.merge(admin::admin_router(state.clone()));
    }

    router
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn(track_request))
        .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn track_request(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
