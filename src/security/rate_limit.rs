//! Admission control: fixed-window rate limiting per client key.
//!
//! A client gets `max_requests` inside a window that starts with its first
//! request. Windows reset at fixed boundaries, so a client can land up to
//! twice the limit across a boundary; that burst is accepted.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// Time until the client's window resets. Zero when allowed.
    pub fn retry_after(&self) -> Duration {
        match self {
            Admission::Allowed => Duration::ZERO,
            Admission::Limited { retry_after } => *retry_after,
        }
    }
}

/// Request count inside one client's current window.
#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    started: Instant,
}

type WindowTable = Arc<Mutex<HashMap<String, ClientWindow>>>;

/// Snapshot of the limiter for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LimiterStats {
    pub tracked_clients: usize,
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Fixed-window limiter. One lock covers lookup, insert and sweep.
pub struct FixedWindowLimiter {
    windows: WindowTable,
    limit: u32,
    window: Duration,
    sweeper: Mutex<Option<Sweeper>>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            limit,
            window,
            sweeper: Mutex::new(None),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Count a request from `client` and decide whether it may proceed.
    pub fn allow(&self, client: &str) -> Admission {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");

        match windows.get_mut(client) {
            Some(w) if now.duration_since(w.started) < self.window => {
                if w.count < self.limit {
                    w.count += 1;
                    Admission::Allowed
                } else {
                    Admission::Limited {
                        retry_after: self.window - now.duration_since(w.started),
                    }
                }
            }
            _ => {
                windows.insert(
                    client.to_string(),
                    ClientWindow {
                        count: 1,
                        started: now,
                    },
                );
                Admission::Allowed
            }
        }
    }

    /// Drop every window at least one window length old. Returns how many
    /// were removed.
    pub fn sweep(&self) -> usize {
        sweep_table(&self.windows, self.window)
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            tracked_clients: self.windows.lock().expect("rate limiter mutex poisoned").len(),
            max_requests: self.limit,
            window_secs: self.window.as_secs(),
        }
    }

    /// Start the periodic sweep (interval = window length). Calling it again
    /// while a sweeper runs is a no-op.
    pub fn start_sweeper(&self) {
        let mut slot = self.sweeper.lock().expect("sweeper mutex poisoned");
        if slot.is_some() {
            return;
        }
        *slot = Some(Sweeper::spawn(self.windows.clone(), self.window));
        tracing::debug!(interval = ?self.window, "Window sweeper started");
    }

    /// Stop the sweeper and wait for its task to exit.
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().expect("sweeper mutex poisoned").take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
            tracing::info!("Window sweeper stopped");
        }
    }
}

fn sweep_table(windows: &WindowTable, window: Duration) -> usize {
    let now = Instant::now();
    let mut windows = windows.lock().expect("rate limiter mutex poisoned");
    let before = windows.len();
    windows.retain(|_, w| now.duration_since(w.started) < window);
    let removed = before - windows.len();
    metrics::record_tracked_clients(windows.len());
    removed
}

/// Background task reaping expired windows.
struct Sweeper {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Sweeper {
    fn spawn(windows: WindowTable, window: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + window, window);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = sweep_table(&windows, window);
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired rate limit windows");
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });
        Self { stop_tx, task }
    }

    async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Window sweeper exited abnormally");
        }
    }
}

/// Derive the admission key for a request: the peer IP without its port.
/// Forwarded headers are consulted only when explicitly trusted.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .or_else(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
            })
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware gating every request through the limiter.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(
        request.headers(),
        peer,
        state.config.listener.trust_forwarded_headers,
    );

    match state.limiter.allow(&key) {
        Admission::Allowed => next.run(request).await,
        Admission::Limited { retry_after } => {
            tracing::warn!(
                client = %key,
                method = %request.method(),
                path = %request.uri().path(),
                retry_after = ?retry_after,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}
