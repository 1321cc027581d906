// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Live-object introspection.
//!
//! Every object the harness wants to watch carries a [`LiveGuard`] that bumps a
//! per-kind counter in [`LiveObjects`] on creation and drops it again on `Drop`.
//! A [`HeapSample`] is a point-in-time copy of those counters keyed by kind name.
//! The growth monitor only ever sees samples through the [`HeapSampler`] trait,
//! so tests can feed it synthetic counts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Kinds of objects counted by the live registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A received response whose body has not been released yet.
    Response,
    /// An in-flight request future (pending or settled, not yet dropped).
    Promise,
    Blob,
    FormData,
    UrlSearchParams,
    AsyncIterator,
    ReadableStream,
}

impl ObjectKind {
    /// Kind name as reported in heap samples.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Response => "Response",
            Self::Promise => "Promise",
            Self::Blob => "Blob",
            Self::FormData => "FormData",
            Self::UrlSearchParams => "URLSearchParams",
            Self::AsyncIterator => "AsyncIterator",
            Self::ReadableStream => "ReadableStream",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Registry of live instance counts per object kind.
#[derive(Debug, Default)]
pub struct LiveObjects {
    counts: DashMap<ObjectKind, usize>,
}

impl LiveObjects {
    /// Create a new shared registry.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new live object of `kind`; it stays counted until the guard drops.
    pub fn track(self: &Arc<Self>, kind: ObjectKind) -> LiveGuard {
        *self.counts.entry(kind).or_insert(0) += 1;
        LiveGuard {
            kind,
            registry: Arc::clone(self),
        }
    }

    /// Current live count for `kind`.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.counts.get(&kind).map(|c| *c).unwrap_or(0)
    }

    /// Snapshot every counter.
    pub fn snapshot(&self) -> HeapSample {
        let counts = self
            .counts
            .iter()
            .map(|entry| (entry.key().name().to_string(), *entry.value()))
            .collect();
        HeapSample { counts }
    }

    fn release(&self, kind: ObjectKind) {
        if let Some(mut count) = self.counts.get_mut(&kind) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Keeps one object counted in its registry for as long as it lives.
pub struct LiveGuard {
    kind: ObjectKind,
    registry: Arc<LiveObjects>,
}

impl LiveGuard {
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
}

impl fmt::Debug for LiveGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveGuard").field("kind", &self.kind).finish()
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.registry.release(self.kind);
    }
}

/// Point-in-time live instance counts, keyed by kind name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapSample {
    counts: HashMap<String, usize>,
}

impl HeapSample {
    /// Build a sample from explicit counts.
    pub fn from_counts<I, K>(counts: I) -> Self
    where
        I: IntoIterator<Item = (K, usize)>,
        K: Into<String>,
    {
        Self {
            counts: counts.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Count for a kind name; kinds never seen count as zero.
    pub fn get(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Count for a known object kind.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.get(kind.name())
    }

    /// Counts ordered by name, for logging.
    pub fn sorted(&self) -> BTreeMap<&str, usize> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect()
    }
}

/// Source of heap samples.
pub trait HeapSampler {
    fn sample(&self) -> HeapSample;
}

impl HeapSampler for LiveObjects {
    fn sample(&self) -> HeapSample {
        self.snapshot()
    }
}

impl<T: HeapSampler + ?Sized> HeapSampler for Arc<T> {
    fn sample(&self) -> HeapSample {
        (**self).sample()
    }
}
