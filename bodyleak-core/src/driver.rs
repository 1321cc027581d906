// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Iteration driver: one batch of concurrent POST requests per round.
//!
//! All requests of a batch are in flight at once on the current task and the
//! batch only returns after every one has settled. Failures are never
//! swallowed: the first failing request's error is returned once the whole
//! batch is done.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use reqwest::{Client, Response};

use crate::body::BodyFactory;
use crate::error::HarnessResult;
use crate::heap::{LiveGuard, LiveObjects, ObjectKind};
use crate::types::{BodyKind, Endpoint};

/// Totals for one completed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub requests: usize,
    pub bytes_received: u64,
}

/// Something that can run one round's batch.
pub trait Workload {
    fn run_batch(&self, batch_size: usize) -> impl Future<Output = HarnessResult<BatchStats>>;
}

/// Posts bodies from a [`BodyFactory`] to the target endpoint.
pub struct IterationDriver {
    client: Client,
    target: Endpoint,
    kind: BodyKind,
    factory: BodyFactory,
    live: Arc<LiveObjects>,
}

impl IterationDriver {
    /// Create a driver with its own pooled HTTP client.
    pub fn new(
        target: Endpoint,
        kind: BodyKind,
        factory: BodyFactory,
        live: Arc<LiveObjects>,
        request_timeout: Duration,
    ) -> HarnessResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            target,
            kind,
            factory,
            live,
        })
    }

    pub fn factory(&self) -> &BodyFactory {
        &self.factory
    }

    /// Send one request. The pending guard travels with the request body and
    /// the response guard with the response, so both stay counted for as long
    /// as the client keeps either alive.
    async fn post_one(&self) -> HarnessResult<u64> {
        let pending = self.live.track(ObjectKind::Promise);

        let payload = self.factory.construct(self.kind);
        let response = payload
            .attach(self.client.post(self.target.url().clone()), pending)
            .send()
            .await?
            .error_for_status()?;

        let response = TrackedResponse::new(response, self.live.track(ObjectKind::Response));
        let body = response.drain().await?;
        Ok(body.len() as u64)
    }
}

/// A received response counted as live until its body has been drained.
struct TrackedResponse {
    inner: Response,
    live: LiveGuard,
}

impl TrackedResponse {
    fn new(inner: Response, live: LiveGuard) -> Self {
        Self { inner, live }
    }

    /// Read the whole body; the response stops counting once it is released.
    async fn drain(self) -> reqwest::Result<Bytes> {
        let TrackedResponse { inner, live } = self;
        let body = inner.bytes().await;
        drop(live);
        body
    }
}

impl Workload for IterationDriver {
    async fn run_batch(&self, batch_size: usize) -> HarnessResult<BatchStats> {
        let outcomes = join_all((0..batch_size).map(|_| self.post_one())).await;

        let mut stats = BatchStats::default();
        let mut first_error = None;
        let mut failed = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(bytes) => {
                    stats.requests += 1;
                    stats.bytes_received += bytes;
                }
                Err(e) => {
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            tracing::error!(failed, batch_size, kind = %self.kind, "Batch had failing requests");
            return Err(e);
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::echo::EchoServer;
    use crate::error::HarnessError;
    use crate::types::BodySize;

    fn driver(target: &str, kind: BodyKind, size: usize) -> (IterationDriver, Arc<LiveObjects>) {
        let live = LiveObjects::new_shared();
        let factory = BodyFactory::new(
            BodySize::new(size),
            Duration::from_millis(10),
            Arc::clone(&live),
        );
        let driver = IterationDriver::new(
            Endpoint::parse(target).unwrap(),
            kind,
            factory,
            Arc::clone(&live),
            Duration::from_secs(5),
        )
        .unwrap();
        (driver, live)
    }

    #[tokio::test]
    async fn test_batch_reaches_target_for_every_kind() {
        let server = EchoServer::spawn_local().await.unwrap();

        for kind in BodyKind::ALL {
            let (driver, live) = driver(&server.url(), kind, 256);
            let stats = driver.run_batch(4).await.unwrap();
            assert_eq!(stats.requests, 4, "kind {}", kind);
            assert!(stats.bytes_received >= 4 * 256, "kind {}", kind);

            tokio::time::sleep(Duration::from_millis(20)).await;
            let leftover: usize = live.snapshot().sorted().values().sum();
            assert_eq!(leftover, 0, "kind {}", kind);
        }

        assert_eq!(server.stats().requests(), 4 * BodyKind::ALL.len() as u64);
    }

    #[tokio::test]
    async fn test_response_counted_until_drained() {
        let server = EchoServer::spawn_local().await.unwrap();
        let live = LiveObjects::new_shared();
        let response = Client::new()
            .post(server.url())
            .body("abc")
            .send()
            .await
            .unwrap();

        let tracked = TrackedResponse::new(response, live.track(ObjectKind::Response));
        assert_eq!(live.count(ObjectKind::Response), 1);

        let body = tracked.drain().await.unwrap();
        assert_eq!(body, "abc");
        assert_eq!(live.count(ObjectKind::Response), 0);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        // Nothing listens on the discard port.
        let (driver, live) = driver("http://127.0.0.1:9/", BodyKind::Buffer, 8);
        let err = driver.run_batch(3).await.unwrap_err();
        assert!(matches!(err, HarnessError::Request(_)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(live.count(ObjectKind::Promise), 0);
    }

    #[tokio::test]
    async fn test_error_status_propagates() {
        let server = EchoServer::spawn_local().await.unwrap();
        let (driver, _live) = driver(&format!("{}status/500", server.url()), BodyKind::Buffer, 8);
        let err = driver.run_batch(2).await.unwrap_err();
        assert!(matches!(err, HarnessError::Request(_)));
    }
}
