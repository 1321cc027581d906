// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Run controller.
//!
//! Strict sequence, no retries:
//! 1. warmup rounds (batch + settle), samples discarded;
//! 2. baseline capture;
//! 3. monitored rounds (batch + settle + sample + evaluate + report RSS);
//! 4. final RSS report and a short exit delay.
//!
//! The first error of any kind ends the run.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::body::BodyFactory;
use crate::config::{RunConfig, Tuning};
use crate::driver::{IterationDriver, Workload};
use crate::error::{HarnessError, HarnessResult};
use crate::heap::{HeapSampler, LiveObjects, ObjectKind};
use crate::monitor::{Baseline, GrowthMonitor, Verdict};
use crate::quiescence::{AllocatorTrim, Collector, Quiescence};
use crate::report::{RssObserver, RssProbe, RssReport};

/// What a passing run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub warmup_rounds: u32,
    pub monitored_rounds: u32,
    pub reports: usize,
    pub baseline: Baseline,
    pub peak_rss: u64,
}

/// Ties the workload, sampler, collector and observer into one run.
pub struct Harness<W, S, C, O> {
    run_id: Uuid,
    tuning: Tuning,
    workload: W,
    sampler: S,
    quiescence: Quiescence<C>,
    monitor: GrowthMonitor,
    observer: O,
    rss: RssProbe,
}

impl<W, S, C, O> Harness<W, S, C, O>
where
    W: Workload,
    S: HeapSampler,
    C: Collector,
    O: RssObserver,
{
    pub fn new(
        tuning: Tuning,
        workload: W,
        sampler: S,
        collector: C,
        observer: O,
    ) -> HarnessResult<Self> {
        let quiescence = Quiescence::new(collector, tuning.collect_passes, tuning.settle_delay);
        let monitor = GrowthMonitor::new(tuning.growth_policy());
        Ok(Self {
            run_id: Uuid::new_v4(),
            tuning,
            workload,
            sampler,
            quiescence,
            monitor,
            observer,
            rss: RssProbe::current()?,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run to completion. A detected leak is returned as `HarnessError::LeakDetected`.
    pub async fn run(mut self) -> HarnessResult<RunSummary> {
        let batch_size = self.tuning.batch_size;
        tracing::debug!(
            run_id = %self.run_id,
            batch_size,
            warmup_rounds = self.tuning.warmup_rounds,
            monitored_rounds = self.tuning.monitored_rounds,
            "Starting run"
        );

        for round in 1..=self.tuning.warmup_rounds {
            let stats = self.workload.run_batch(batch_size).await?;
            self.quiescence.settle().await;
            tracing::debug!(round, requests = stats.requests, "Warmup round complete");
        }

        let baseline = self.monitor.capture_baseline(&self.sampler.sample())?;
        tracing::debug!(
            response = baseline.count(ObjectKind::Response),
            promise = baseline.count(ObjectKind::Promise),
            total = baseline.total(),
            "Baseline captured"
        );

        let mut reports = 0usize;
        let mut peak_rss = 0u64;

        for round in 1..=self.tuning.monitored_rounds {
            let stats = self.workload.run_batch(batch_size).await?;
            self.quiescence.settle().await;

            let sample = self.sampler.sample();
            tracing::debug!(
                round,
                requests = stats.requests,
                live = ?sample.sorted(),
                "Sampled"
            );

            match self.monitor.evaluate(&sample)? {
                Verdict::Pass => {
                    let rss = self.rss.sample()?;
                    peak_rss = peak_rss.max(rss);
                    self.observer
                        .observe(&RssReport::round(self.run_id, round, rss))?;
                    reports += 1;
                }
                Verdict::Fail(report) => {
                    tracing::error!(
                        round,
                        kind = %report.kind,
                        observed = report.observed,
                        limit = report.limit,
                        baseline = report.baseline,
                        "Leak detected"
                    );
                    return Err(HarnessError::LeakDetected(report));
                }
            }
        }

        let rss = self.rss.sample()?;
        peak_rss = peak_rss.max(rss);
        self.observer.observe(&RssReport::last(self.run_id, rss))?;
        reports += 1;

        tokio::time::sleep(self.tuning.exit_delay).await;

        let summary = RunSummary {
            run_id: self.run_id,
            warmup_rounds: self.tuning.warmup_rounds,
            monitored_rounds: self.tuning.monitored_rounds,
            reports,
            baseline,
            peak_rss,
        };
        tracing::debug!(
            run_id = %summary.run_id,
            reports = summary.reports,
            peak_rss = summary.peak_rss,
            "Run passed"
        );
        Ok(summary)
    }
}

/// Production harness: HTTP driver, live-object sampler, allocator trim.
pub type HttpHarness<O> = Harness<IterationDriver, Arc<LiveObjects>, AllocatorTrim, O>;

/// Build the production harness for a validated configuration.
pub fn build<O: RssObserver>(config: RunConfig, observer: O) -> HarnessResult<HttpHarness<O>> {
    let live = LiveObjects::new_shared();
    let factory = BodyFactory::new(
        config.body.size,
        config.tuning.stream_delay,
        Arc::clone(&live),
    );
    let driver = IterationDriver::new(
        config.target,
        config.body.kind,
        factory,
        Arc::clone(&live),
        config.tuning.request_timeout,
    )?;
    Harness::new(config.tuning, driver, live, AllocatorTrim, observer)
}
