// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `bodyleak serve` command - Serve a local echo target.

use std::net::SocketAddr;

use bodyleak_core::{EchoServer, HarnessError, HarnessResult};

pub async fn execute(port: u16) -> HarnessResult<()> {
    let server = EchoServer::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;

    println!("✓ Echo target listening on {}", server.url());
    println!("  Press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| HarnessError::Io {
            context: "waiting for shutdown signal",
            source: e,
        })?;

    let stats = server.stats();
    tracing::info!(
        requests = stats.requests(),
        bytes = stats.bytes(),
        "Echo target stopped"
    );
    Ok(())
}
