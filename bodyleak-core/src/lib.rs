//! bodyleak Core Library
//!
//! Memory-growth regression harness for HTTP client request-body handling.
//! Repeatedly posts batches of concurrent requests carrying one of seven body
//! representations, settles the process, samples live-object counts and RSS,
//! and fails when growth exceeds an adaptive ceiling over a post-warmup
//! baseline.

pub mod body;
pub mod config;
pub mod driver;
pub mod echo;
pub mod error;
pub mod heap;
pub mod monitor;
pub mod quiescence;
pub mod report;
pub mod runner;
pub mod types;

// Re-export commonly used types
pub use body::{BodyFactory, BodyPayload};
pub use config::{RunConfig, Tuning, TuningLoader};
pub use driver::{IterationDriver, Workload};
pub use echo::EchoServer;
pub use error::{ConfigError, HarnessError, HarnessResult, MonitorError};
pub use heap::{HeapSample, HeapSampler, LiveObjects, ObjectKind};
pub use monitor::{Baseline, GrowthMonitor, GrowthPolicy, LeakReport, Verdict};
pub use quiescence::{AllocatorTrim, Collector, Quiescence};
pub use report::{JsonLinesObserver, RssObserver, RssProbe, RssReport};
pub use runner::{Harness, RunSummary};
pub use types::{BodyKind, BodySize, BodySpec, Endpoint};
