// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Quiescence controller.
//!
//! A forced collection is not enough on its own: connection teardown and
//! response-body release happen on other tasks and lag behind. `settle()`
//! repeats {collect, yield, sleep} so those tasks get to run before the
//! next heap sample is taken.

use std::time::Duration;

/// A forced reclamation pass.
pub trait Collector {
    fn collect(&self);
}

/// Returns freed heap pages to the OS so RSS tracks live memory.
///
/// Uses `malloc_trim(0)` on glibc; a no-op on other targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocatorTrim;

impl Collector for AllocatorTrim {
    fn collect(&self) {
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        {
            // SAFETY: malloc_trim only walks allocator-internal free lists.
            let released = unsafe { libc::malloc_trim(0) };
            tracing::trace!(released = released != 0, "malloc_trim");
        }
    }
}

/// Runs a fixed number of collect + delay cycles.
#[derive(Debug, Clone)]
pub struct Quiescence<C> {
    collector: C,
    passes: u32,
    delay: Duration,
}

impl<C: Collector> Quiescence<C> {
    pub fn new(collector: C, passes: u32, delay: Duration) -> Self {
        Self {
            collector,
            passes,
            delay,
        }
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Give deferred teardown every reasonable chance to finish.
    pub async fn settle(&self) {
        for _ in 0..self.passes {
            self.collector.collect();
            tokio::task::yield_now().await;
            tokio::time::sleep(self.delay).await;
        }
    }
}
