// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `bodyleak run` command - Run the harness against a target.
//!
//! Invocation parameters are validated before any network activity. A
//! passing run writes nothing but the RSS reports.

use bodyleak_core::runner;
use bodyleak_core::{HarnessResult, JsonLinesObserver, RunConfig, Tuning, TuningLoader};

pub async fn execute(
    target: &str,
    body_size: &str,
    body_kind: &str,
    tuning_path: Option<&str>,
) -> HarnessResult<()> {
    let tuning = match tuning_path {
        Some(path) => {
            tracing::debug!(file = %path, "Loading tuning");
            TuningLoader::load_file(path)?
        }
        None => Tuning::default(),
    };

    let config = RunConfig::from_args(target, body_size, body_kind, tuning)?;
    tracing::debug!(
        target = %config.target,
        body_size = %config.body.size,
        body_kind = %config.body.kind,
        "Configuration validated"
    );

    let harness = runner::build(config, JsonLinesObserver::stdout())?;
    let summary = harness.run().await?;

    // Success is silent apart from the reports on stdout.
    tracing::debug!(
        monitored_rounds = summary.monitored_rounds,
        reports = summary.reports,
        peak_rss = summary.peak_rss,
        "No leak detected"
    );
    Ok(())
}
