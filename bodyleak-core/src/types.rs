// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time, so an unknown body kind
//! or a fractional byte length is rejected before the first round.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Request-body representation under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BodyKind {
    /// Fresh blob wrapper over the shared buffer.
    Blob,
    /// The shared byte buffer itself.
    Buffer,
    /// The shared decoded string.
    String,
    /// Fresh multipart container with a fresh blob field.
    FormData,
    /// Fresh urlencoded container over the shared string.
    UrlSearchParams,
    /// Fresh single-shot producer yielding the shared string once.
    AsyncIterator,
    /// Fresh push source emitting the shared buffer once after a delay.
    Stream,
}

impl BodyKind {
    /// Every kind, in the order they are listed on the command line.
    pub const ALL: [BodyKind; 7] = [
        Self::Blob,
        Self::Buffer,
        Self::String,
        Self::FormData,
        Self::UrlSearchParams,
        Self::AsyncIterator,
        Self::Stream,
    ];

    /// Command-line name of the kind.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Buffer => "buffer",
            Self::String => "string",
            Self::FormData => "form-data",
            Self::UrlSearchParams => "url-search-params",
            Self::AsyncIterator => "async-iterator",
            Self::Stream => "stream",
        }
    }

    fn expected_names() -> String {
        Self::ALL
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BodyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownBodyKind {
                value: s.to_string(),
                expected: Self::expected_names(),
            })
    }
}

impl TryFrom<String> for BodyKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BodyKind> for String {
    fn from(kind: BodyKind) -> Self {
        kind.name().to_string()
    }
}

/// Validated body byte length.
/// Only plain decimal integers are accepted: no sign, no fraction, no exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodySize(usize);

impl BodySize {
    /// Create a BodySize from a byte count.
    pub const fn new(bytes: usize) -> Self {
        Self(bytes)
    }

    /// Parse a byte length exactly as given on the command line.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBodySize {
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("must be a non-negative integer"));
        }

        trimmed
            .parse::<usize>()
            .map(Self)
            .map_err(|_| invalid("too large to represent exactly"))
    }

    /// Get the byte count.
    pub fn bytes(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BodySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

/// Validated POST target.
/// Must be an absolute http or https URL with a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parse and validate a target URL.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEndpoint {
            value: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                value: raw.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidEndpoint {
                value: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self(url))
    }

    /// Get the inner URL.
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte length and representation of every body constructed in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySpec {
    pub size: BodySize,
    pub kind: BodyKind,
}
