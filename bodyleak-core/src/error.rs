// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for bodyleak.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.
//! Nothing in the harness recovers locally: every variant ends the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::monitor::LeakReport;

/// Top-level error type for a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    // =========================================================================
    // Configuration Errors - Fail-Fast Before Any Round Runs
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // =========================================================================
    // Monitor Errors
    // =========================================================================
    #[error("Growth monitor error: {0}")]
    Monitor(#[from] MonitorError),

    // =========================================================================
    // Request Errors - Never Retried
    // =========================================================================
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    // =========================================================================
    // Detected Leak
    // =========================================================================
    #[error("{0}")]
    LeakDetected(LeakReport),

    // =========================================================================
    // Reporting / System Errors
    // =========================================================================
    #[error("Observer error: {0}")]
    Observer(#[from] serde_json::Error),

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("RSS probe unavailable: {reason}")]
    Rss { reason: String },
}

impl HarnessError {
    /// Short label for the error class, used in the failure line on stderr.
    pub const fn class(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Monitor(_) => "monitor",
            Self::Request(_) => "request",
            Self::LeakDetected(_) => "leak",
            Self::Observer(_) | Self::Io { .. } | Self::Rss { .. } => "system",
        }
    }
}

/// Configuration errors cause immediate termination before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid body size: {value:?} - {reason}")]
    InvalidBodySize { value: String, reason: String },

    #[error("Unrecognized body kind: {value:?} (expected one of: {expected})")]
    UnknownBodyKind { value: String, expected: String },

    #[error("Invalid target endpoint: {value:?} - {reason}")]
    InvalidEndpoint { value: String, reason: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Tuning file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Tuning file parse error: {message}")]
    ConfigParse { message: String },
}

/// Growth monitor state errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Baseline already captured; the baseline is set once per run")]
    BaselineAlreadyCaptured,

    #[error("No baseline captured; cannot evaluate a sample")]
    BaselineMissing,
}

/// Result type alias using HarnessError.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnknownBodyKind {
            value: "xml".to_string(),
            expected: "blob, buffer".to_string(),
        };
        assert!(err.to_string().contains("\"xml\""));
        assert!(err.to_string().contains("blob, buffer"));
    }

    #[test]
    fn test_error_chain() {
        let config_err = ConfigError::InvalidBodySize {
            value: "3.5".to_string(),
            reason: "must be a non-negative integer".to_string(),
        };
        let err: HarnessError = config_err.into();
        assert!(matches!(err, HarnessError::Config(_)));
        assert_eq!(err.class(), "configuration");
    }

    #[test]
    fn test_monitor_error_class() {
        let err: HarnessError = MonitorError::BaselineMissing.into();
        assert_eq!(err.class(), "monitor");
    }
}
