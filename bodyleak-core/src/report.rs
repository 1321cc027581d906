// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resident-memory probe and the per-round reporting channel.
//!
//! After every monitored round, and once more at the end, the harness emits
//! one [`RssReport`] to an [`RssObserver`]. The production observer writes one
//! JSON object per line so a supervising parent can read them off stdout.

use std::io::Write;

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use uuid::Uuid;

use crate::error::{HarnessError, HarnessResult};

/// Reads the resident set size of the current process.
pub struct RssProbe {
    system: System,
    pid: Pid,
}

impl RssProbe {
    /// Create a probe bound to the current process.
    pub fn current() -> HarnessResult<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| HarnessError::Rss {
            reason: e.to_string(),
        })?;
        Ok(Self::for_pid(pid))
    }

    pub(crate) fn for_pid(pid: Pid) -> Self {
        Self {
            system: System::new(),
            pid,
        }
    }

    /// Current RSS in bytes.
    pub fn sample(&mut self) -> HarnessResult<u64> {
        if !self.system.refresh_process(self.pid) {
            return Err(HarnessError::Rss {
                reason: format!("process {} could not be refreshed", self.pid),
            });
        }
        self.system
            .process(self.pid)
            .map(|p| p.memory())
            .ok_or_else(|| HarnessError::Rss {
                reason: format!("process {} not found", self.pid),
            })
    }
}

/// One message on the reporting channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssReport {
    pub run_id: Uuid,
    /// Monitored round number, starting at 1; `None` on the final report.
    pub round: Option<u32>,
    /// Resident set size in bytes.
    pub rss: u64,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

impl RssReport {
    pub fn round(run_id: Uuid, round: u32, rss: u64) -> Self {
        Self {
            run_id,
            round: Some(round),
            rss,
            is_final: false,
        }
    }

    pub fn last(run_id: Uuid, rss: u64) -> Self {
        Self {
            run_id,
            round: None,
            rss,
            is_final: true,
        }
    }
}

/// Fire-and-forget receiver of RSS reports.
pub trait RssObserver {
    fn observe(&mut self, report: &RssReport) -> HarnessResult<()>;
}

impl<T: RssObserver + ?Sized> RssObserver for &mut T {
    fn observe(&mut self, report: &RssReport) -> HarnessResult<()> {
        (**self).observe(report)
    }
}

/// Records reports in memory.
impl RssObserver for Vec<RssReport> {
    fn observe(&mut self, report: &RssReport) -> HarnessResult<()> {
        self.push(report.clone());
        Ok(())
    }
}

/// Writes each report as one JSON line and flushes it immediately.
pub struct JsonLinesObserver<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> RssObserver for JsonLinesObserver<W> {
    fn observe(&mut self, report: &RssReport) -> HarnessResult<()> {
        serde_json::to_writer(&mut self.writer, report)?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|e| HarnessError::Io {
                context: "writing RSS report",
                source: e,
            })
    }
}
