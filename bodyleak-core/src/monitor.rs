// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Growth monitor with a set-once baseline.
//!
//! Implements the lifecycle: Uninitialized → Monitoring. There is no way back;
//! a second baseline capture is rejected with MonitorError.
//!
//! For each tracked kind the ceiling is
//! `max(baseline × growth_factor, batch_size × per_batch_floor)`. The floor
//! keeps a baseline of zero or one from turning into a ceiling of zero.
//!
//! Tracked kinds are the response and pending-request counts plus every
//! request-body wrapper, so a client that holds on to bodies fails the run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::heap::{HeapSample, ObjectKind};

/// Object kinds whose growth fails a run, in reporting order.
pub const TRACKED_KINDS: [ObjectKind; 7] = [
    ObjectKind::Response,
    ObjectKind::Promise,
    ObjectKind::Blob,
    ObjectKind::FormData,
    ObjectKind::UrlSearchParams,
    ObjectKind::AsyncIterator,
    ObjectKind::ReadableStream,
];

/// Monitor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    /// No baseline yet; samples cannot be evaluated.
    Uninitialized,
    /// Baseline captured; every sample is evaluated against it.
    Monitoring,
}

impl MonitorState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Monitoring => "Monitoring",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tracked counts captured once after warmup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    counts: BTreeMap<ObjectKind, usize>,
}

impl Baseline {
    pub fn from_sample(sample: &HeapSample) -> Self {
        Self {
            counts: TRACKED_KINDS
                .iter()
                .map(|&kind| (kind, sample.count(kind)))
                .collect(),
        }
    }

    /// Baseline count for a kind; kinds absent at capture count as zero.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Sum over every tracked kind.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Ceiling formula parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthPolicy {
    pub growth_factor: u64,
    pub per_batch_floor: u64,
    pub batch_size: usize,
}

impl GrowthPolicy {
    /// `max(baseline × growth_factor, batch_size × per_batch_floor)`
    pub fn limit(&self, baseline: usize) -> u64 {
        let scaled = (baseline as u64).saturating_mul(self.growth_factor);
        let floor = (self.batch_size as u64).saturating_mul(self.per_batch_floor);
        scaled.max(floor)
    }
}

/// Diagnostic for a sample that exceeded its ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    pub kind: ObjectKind,
    pub observed: usize,
    pub limit: u64,
    pub baseline: usize,
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Leak detected: {} count {} exceeds limit {} (baseline {})",
            self.kind, self.observed, self.limit, self.baseline
        )
    }
}

/// Outcome of evaluating one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(LeakReport),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Evaluates heap samples against a set-once baseline.
#[derive(Debug)]
pub struct GrowthMonitor {
    policy: GrowthPolicy,
    baseline: Option<Baseline>,
}

impl GrowthMonitor {
    pub fn new(policy: GrowthPolicy) -> Self {
        Self {
            policy,
            baseline: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.baseline.is_some() {
            MonitorState::Monitoring
        } else {
            MonitorState::Uninitialized
        }
    }

    pub fn policy(&self) -> &GrowthPolicy {
        &self.policy
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    /// Store the baseline. Only valid from `Uninitialized`.
    pub fn capture_baseline(&mut self, sample: &HeapSample) -> Result<Baseline, MonitorError> {
        if self.baseline.is_some() {
            return Err(MonitorError::BaselineAlreadyCaptured);
        }

        let baseline = Baseline::from_sample(sample);
        tracing::debug!(
            from = MonitorState::Uninitialized.name(),
            to = MonitorState::Monitoring.name(),
            response = baseline.count(ObjectKind::Response),
            promise = baseline.count(ObjectKind::Promise),
            total = baseline.total(),
            "Baseline captured"
        );
        self.baseline = Some(baseline.clone());
        Ok(baseline)
    }

    /// Evaluate a sample. Tracked kinds are checked in order; the first
    /// kind over its ceiling is reported.
    pub fn evaluate(&self, sample: &HeapSample) -> Result<Verdict, MonitorError> {
        let baseline = self.baseline.as_ref().ok_or(MonitorError::BaselineMissing)?;

        for kind in TRACKED_KINDS {
            let observed = sample.count(kind);
            let base = baseline.count(kind);
            let limit = self.policy.limit(base);
            if observed as u64 > limit {
                return Ok(Verdict::Fail(LeakReport {
                    kind,
                    observed,
                    limit,
                    baseline: base,
                }));
            }
        }

        Ok(Verdict::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> GrowthPolicy {
        GrowthPolicy {
            growth_factor: 5,
            per_batch_floor: 45,
            batch_size: 10,
        }
    }

    fn sample(response: usize, promise: usize) -> HeapSample {
        HeapSample::from_counts([("Response", response), ("Promise", promise)])
    }

    fn monitored(response: usize, promise: usize) -> GrowthMonitor {
        let mut monitor = GrowthMonitor::new(policy());
        monitor.capture_baseline(&sample(response, promise)).unwrap();
        monitor
    }

    #[test]
    fn test_limit_formula() {
        let p = policy();
        assert_eq!(p.limit(0), 450);
        assert_eq!(p.limit(90), 450);
        assert_eq!(p.limit(100), 500);
        assert_eq!(p.limit(usize::MAX), u64::MAX);
    }

    #[test]
    fn test_initial_state() {
        let monitor = GrowthMonitor::new(policy());
        assert_eq!(monitor.state(), MonitorState::Uninitialized);
        assert!(monitor.baseline().is_none());
    }

    #[test]
    fn test_evaluate_requires_baseline() {
        let monitor = GrowthMonitor::new(policy());
        assert_eq!(
            monitor.evaluate(&sample(0, 0)),
            Err(MonitorError::BaselineMissing)
        );
    }

    #[test]
    fn test_baseline_is_set_once() {
        let mut monitor = GrowthMonitor::new(policy());
        let first = monitor.capture_baseline(&sample(3, 7)).unwrap();
        assert_eq!(monitor.state(), MonitorState::Monitoring);

        assert_eq!(
            monitor.capture_baseline(&sample(100, 100)),
            Err(MonitorError::BaselineAlreadyCaptured)
        );
        assert_eq!(monitor.baseline(), Some(&first));
        assert_eq!(first.count(ObjectKind::Response), 3);
        assert_eq!(first.count(ObjectKind::Promise), 7);
        assert_eq!(first.count(ObjectKind::Blob), 0);
    }

    #[test]
    fn test_response_boundary_floor() {
        let monitor = monitored(0, 0);
        assert!(monitor.evaluate(&sample(450, 0)).unwrap().is_pass());
        assert_eq!(
            monitor.evaluate(&sample(451, 0)).unwrap(),
            Verdict::Fail(LeakReport {
                kind: ObjectKind::Response,
                observed: 451,
                limit: 450,
                baseline: 0,
            })
        );
    }

    #[test]
    fn test_promise_boundary_floor() {
        let monitor = monitored(0, 0);
        assert!(monitor.evaluate(&sample(0, 450)).unwrap().is_pass());
        assert_eq!(
            monitor.evaluate(&sample(0, 451)).unwrap(),
            Verdict::Fail(LeakReport {
                kind: ObjectKind::Promise,
                observed: 451,
                limit: 450,
                baseline: 0,
            })
        );
    }

    #[test]
    fn test_response_boundary_growth_factor() {
        let monitor = monitored(200, 0);
        assert!(monitor.evaluate(&sample(1000, 0)).unwrap().is_pass());
        assert_eq!(
            monitor.evaluate(&sample(1001, 0)).unwrap(),
            Verdict::Fail(LeakReport {
                kind: ObjectKind::Response,
                observed: 1001,
                limit: 1000,
                baseline: 200,
            })
        );
    }

    #[test]
    fn test_promise_boundary_growth_factor() {
        let monitor = monitored(0, 120);
        assert!(monitor.evaluate(&sample(0, 600)).unwrap().is_pass());
        assert_eq!(
            monitor.evaluate(&sample(0, 601)).unwrap(),
            Verdict::Fail(LeakReport {
                kind: ObjectKind::Promise,
                observed: 601,
                limit: 600,
                baseline: 120,
            })
        );
    }

    #[test]
    fn test_response_reported_first() {
        let monitor = monitored(0, 0);
        match monitor.evaluate(&sample(1000, 1000)).unwrap() {
            Verdict::Fail(report) => assert_eq!(report.kind, ObjectKind::Response),
            Verdict::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn test_zero_floor_zero_baseline_fails_on_any_response() {
        let mut monitor = GrowthMonitor::new(GrowthPolicy {
            per_batch_floor: 0,
            ..policy()
        });
        monitor.capture_baseline(&sample(0, 0)).unwrap();
        assert!(monitor.evaluate(&sample(0, 0)).unwrap().is_pass());
        assert!(!monitor.evaluate(&sample(1, 0)).unwrap().is_pass());
    }

    #[test]
    fn test_body_wrappers_are_evaluated() {
        let monitor = monitored(0, 0);
        for kind in &TRACKED_KINDS[2..] {
            let at_limit = HeapSample::from_counts([(kind.name(), 450)]);
            assert!(monitor.evaluate(&at_limit).unwrap().is_pass(), "{kind}");

            let over = HeapSample::from_counts([(kind.name(), 451)]);
            assert_eq!(
                monitor.evaluate(&over).unwrap(),
                Verdict::Fail(LeakReport {
                    kind: *kind,
                    observed: 451,
                    limit: 450,
                    baseline: 0,
                })
            );
        }
    }

    #[test]
    fn test_body_wrapper_baseline_scales_limit() {
        let mut monitor = GrowthMonitor::new(policy());
        let blobs = HeapSample::from_counts([("Blob", 100)]);
        let baseline = monitor.capture_baseline(&blobs).unwrap();
        assert_eq!(baseline.count(ObjectKind::Blob), 100);

        let grown = HeapSample::from_counts([("Blob", 500)]);
        assert!(monitor.evaluate(&grown).unwrap().is_pass());
        let leaked = HeapSample::from_counts([("Blob", 501)]);
        assert!(!monitor.evaluate(&leaked).unwrap().is_pass());
    }

    #[test]
    fn test_unknown_names_ignored() {
        let monitor = monitored(0, 0);
        let noisy = HeapSample::from_counts([("Closure", 10_000), ("Response", 1)]);
        assert!(monitor.evaluate(&noisy).unwrap().is_pass());
    }

    #[test]
    fn test_leak_report_display() {
        let report = LeakReport {
            kind: ObjectKind::Promise,
            observed: 500,
            limit: 450,
            baseline: 2,
        };
        let text = report.to_string();
        assert!(text.contains("Promise"));
        assert!(text.contains("500"));
        assert!(text.contains("450"));
        assert!(text.contains("baseline 2"));
    }
}
