// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stub echo target.
//!
//! Answers every request by echoing the body back with the request's
//! content type. `/status/{code}` answers with that status instead, which is
//! how tests inject request failures. Request and byte totals are kept so a
//! test can check that no round was dropped.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::error::{HarnessError, HarnessResult};

/// Totals observed by the echo target.
#[derive(Debug, Default)]
pub struct EchoStats {
    requests: AtomicU64,
    bytes: AtomicU64,
}

impl EchoStats {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn record(&self, bytes: usize) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

#[derive(Clone)]
struct EchoState {
    stats: Arc<EchoStats>,
}

/// Build the echo router.
pub fn router(stats: Arc<EchoStats>) -> Router {
    Router::new()
        .route("/status/{code}", any(status_handler))
        .fallback(echo_handler)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(EchoState { stats })
}

/// Serve the echo router on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, stats: Arc<EchoStats>) -> HarnessResult<()> {
    axum::serve(listener, router(stats))
        .await
        .map_err(|e| HarnessError::Io {
            context: "serving echo target",
            source: e,
        })
}

async fn echo_handler(
    State(state): State<EchoState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.stats.record(body.len());

    let mut response = body.into_response();
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, content_type.clone());
    }
    response
}

async fn status_handler(
    State(state): State<EchoState>,
    Path(code): Path<u16>,
    body: Bytes,
) -> StatusCode {
    state.stats.record(body.len());
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// An echo target running as a background task; stopped on drop.
pub struct EchoServer {
    addr: SocketAddr,
    stats: Arc<EchoStats>,
    handle: JoinHandle<()>,
}

impl EchoServer {
    /// Bind `addr` and serve in the background.
    pub async fn bind(addr: SocketAddr) -> HarnessResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HarnessError::Io {
                context: "binding echo target",
                source: e,
            })?;
        let addr = listener.local_addr().map_err(|e| HarnessError::Io {
            context: "reading echo target address",
            source: e,
        })?;

        let stats = Arc::new(EchoStats::default());
        let task_stats = Arc::clone(&stats);
        let handle = tokio::spawn(async move {
            if let Err(e) = serve(listener, task_stats).await {
                tracing::error!(error = %e, "Echo target stopped");
            }
        });

        tracing::debug!(%addr, "Echo target listening");
        Ok(Self {
            addr,
            stats,
            handle,
        })
    }

    /// Bind an ephemeral loopback port.
    pub async fn spawn_local() -> HarnessResult<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL, with a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn stats(&self) -> &EchoStats {
        &self.stats
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_body_and_content_type() {
        let server = EchoServer::spawn_local().await.unwrap();
        let client = reqwest::Client::new();

        let response = client
            .post(server.url())
            .header(CONTENT_TYPE, "text/plain")
            .body("hello")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(response.bytes().await.unwrap(), "hello");

        assert_eq!(server.stats().requests(), 1);
        assert_eq!(server.stats().bytes(), 5);
    }

    #[tokio::test]
    async fn test_status_route() {
        let server = EchoServer::spawn_local().await.unwrap();
        let response = reqwest::Client::new()
            .post(format!("{}status/503", server.url()))
            .body("x")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_large_body_not_limited() {
        let server = EchoServer::spawn_local().await.unwrap();
        let body = vec![b'x'; 4 * 1024 * 1024];
        let response = reqwest::Client::new()
            .post(server.url())
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.bytes().await.unwrap().len(), 4 * 1024 * 1024);
    }
}
