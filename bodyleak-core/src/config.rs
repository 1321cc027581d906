// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Run configuration.
//!
//! Two layers:
//! - positional invocation parameters (target, byte length, body kind), validated
//!   into [`RunConfig`] before any network activity;
//! - per-target tuning constants, loaded from an optional YAML file with strict
//!   validation. Any invalid field results in a ConfigError that prevents the run.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, HarnessError, HarnessResult};
use crate::monitor::GrowthPolicy;
use crate::types::{BodyKind, BodySize, BodySpec, Endpoint};

/// Upper bound for every configurable delay.
const MAX_DELAY_MS: u64 = 60_000;

/// Raw tuning as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTuning {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_warmup_rounds")]
    warmup_rounds: u32,
    #[serde(default = "default_monitored_rounds")]
    monitored_rounds: u32,
    #[serde(default = "default_growth_factor")]
    growth_factor: u64,
    #[serde(default = "default_per_batch_floor")]
    per_batch_floor: u64,
    #[serde(default = "default_collect_passes")]
    collect_passes: u32,
    #[serde(default = "default_settle_delay_ms")]
    settle_delay_ms: u64,
    #[serde(default = "default_stream_delay_ms")]
    stream_delay_ms: u64,
    #[serde(default = "default_exit_delay_ms")]
    exit_delay_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    10
}

fn default_warmup_rounds() -> u32 {
    5
}

fn default_monitored_rounds() -> u32 {
    50
}

fn default_growth_factor() -> u64 {
    5
}

fn default_per_batch_floor() -> u64 {
    45 // absorbs collector timing noise per request in flight
}

fn default_collect_passes() -> u32 {
    3
}

fn default_settle_delay_ms() -> u64 {
    50
}

fn default_stream_delay_ms() -> u64 {
    10
}

fn default_exit_delay_ms() -> u64 {
    10
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for RawTuning {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            warmup_rounds: default_warmup_rounds(),
            monitored_rounds: default_monitored_rounds(),
            growth_factor: default_growth_factor(),
            per_batch_floor: default_per_batch_floor(),
            collect_passes: default_collect_passes(),
            settle_delay_ms: default_settle_delay_ms(),
            stream_delay_ms: default_stream_delay_ms(),
            exit_delay_ms: default_exit_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Validated tuning constants for one target runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tuning {
    pub batch_size: usize,
    pub warmup_rounds: u32,
    pub monitored_rounds: u32,
    pub growth_factor: u64,
    pub per_batch_floor: u64,
    pub collect_passes: u32,
    pub settle_delay: Duration,
    pub stream_delay: Duration,
    pub exit_delay: Duration,
    pub request_timeout: Duration,
}

impl Tuning {
    /// Growth ceiling parameters derived from this tuning.
    pub fn growth_policy(&self) -> GrowthPolicy {
        GrowthPolicy {
            growth_factor: self.growth_factor,
            per_batch_floor: self.per_batch_floor,
            batch_size: self.batch_size,
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            warmup_rounds: default_warmup_rounds(),
            monitored_rounds: default_monitored_rounds(),
            growth_factor: default_growth_factor(),
            per_batch_floor: default_per_batch_floor(),
            collect_passes: default_collect_passes(),
            settle_delay: Duration::from_millis(default_settle_delay_ms()),
            stream_delay: Duration::from_millis(default_stream_delay_ms()),
            exit_delay: Duration::from_millis(default_exit_delay_ms()),
            request_timeout: Duration::from_millis(default_request_timeout_ms()),
        }
    }
}

/// Tuning loader with strict validation.
pub struct TuningLoader;

impl TuningLoader {
    /// Load and validate tuning from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> HarnessResult<Tuning> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::ConfigNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::Io {
            context: "reading tuning file",
            source: e,
        })?;

        Ok(Self::load_string(&content)?)
    }

    /// Load and validate tuning from a YAML string. An empty document yields defaults.
    pub fn load_string(content: &str) -> Result<Tuning, ConfigError> {
        if content.trim().is_empty() {
            return Self::validate(RawTuning::default());
        }

        let raw: RawTuning =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawTuning) -> Result<Tuning, ConfigError> {
        Self::at_least_one("batch_size", raw.batch_size as u64)?;
        Self::at_least_one("monitored_rounds", raw.monitored_rounds as u64)?;
        Self::at_least_one("growth_factor", raw.growth_factor)?;
        Self::at_least_one("collect_passes", raw.collect_passes as u64)?;
        Self::at_least_one("request_timeout_ms", raw.request_timeout_ms)?;

        Ok(Tuning {
            batch_size: raw.batch_size,
            warmup_rounds: raw.warmup_rounds,
            monitored_rounds: raw.monitored_rounds,
            growth_factor: raw.growth_factor,
            per_batch_floor: raw.per_batch_floor,
            collect_passes: raw.collect_passes,
            settle_delay: Self::delay("settle_delay_ms", raw.settle_delay_ms)?,
            stream_delay: Self::delay("stream_delay_ms", raw.stream_delay_ms)?,
            exit_delay: Self::delay("exit_delay_ms", raw.exit_delay_ms)?,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
        })
    }

    fn at_least_one(field: &'static str, value: u64) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field,
                value: "0".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn delay(field: &'static str, ms: u64) -> Result<Duration, ConfigError> {
        if ms > MAX_DELAY_MS {
            return Err(ConfigError::InvalidFieldValue {
                field,
                value: ms.to_string(),
                reason: format!("Must not exceed {}ms", MAX_DELAY_MS),
            });
        }
        Ok(Duration::from_millis(ms))
    }
}

/// Complete validated configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: Endpoint,
    pub body: BodySpec,
    pub tuning: Tuning,
}

impl RunConfig {
    /// Validate the positional invocation parameters in order: target, byte
    /// length, body kind.
    pub fn from_args(
        target: &str,
        body_size: &str,
        body_kind: &str,
        tuning: Tuning,
    ) -> Result<Self, ConfigError> {
        let target = Endpoint::parse(target)?;
        let size = BodySize::parse(body_size)?;
        let kind: BodyKind = body_kind.parse()?;

        Ok(Self {
            target,
            body: BodySpec { size, kind },
            tuning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID_TUNING: &str = r#"
batch_size: 20
warmup_rounds: 2
monitored_rounds: 10
growth_factor: 4
per_batch_floor: 30
collect_passes: 2
settle_delay_ms: 25
stream_delay_ms: 15
exit_delay_ms: 5
request_timeout_ms: 1000
"#;

    #[test]
    fn test_valid_tuning() {
        let tuning = TuningLoader::load_string(VALID_TUNING).unwrap();
        assert_eq!(tuning.batch_size, 20);
        assert_eq!(tuning.monitored_rounds, 10);
        assert_eq!(tuning.settle_delay, Duration::from_millis(25));
        assert_eq!(tuning.growth_policy().limit(0), 600);
    }

    #[test]
    fn test_defaults_applied() {
        let tuning = TuningLoader::load_string("batch_size: 4\n").unwrap();
        assert_eq!(tuning.batch_size, 4);
        assert_eq!(tuning.warmup_rounds, 5);
        assert_eq!(tuning.monitored_rounds, 50);
        assert_eq!(tuning.growth_factor, 5);
        assert_eq!(tuning.per_batch_floor, 45);
        assert_eq!(tuning.collect_passes, 3);
        assert_eq!(tuning.settle_delay, Duration::from_millis(50));
        assert_eq!(tuning.stream_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(TuningLoader::load_string("").unwrap(), Tuning::default());
    }

    #[test]
    fn test_zero_floor_allowed() {
        let tuning = TuningLoader::load_string("per_batch_floor: 0\n").unwrap();
        assert_eq!(tuning.per_batch_floor, 0);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = TuningLoader::load_string("batch_size: 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidFieldValue {
                field: "batch_size",
                ..
            }
        ));
    }

    #[test]
    fn test_delay_too_long_rejected() {
        assert!(TuningLoader::load_string("settle_delay_ms: 600000\n").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(TuningLoader::load_string("batch_sise: 10\n").is_err());
    }

    #[test]
    fn test_fractional_value_rejected() {
        assert!(TuningLoader::load_string("batch_size: 2.5\n").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID_TUNING.as_bytes()).unwrap();
        let tuning = TuningLoader::load_file(file.path()).unwrap();
        assert_eq!(tuning.collect_passes, 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = TuningLoader::load_file("/nonexistent/bodyleak.yaml").unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Config(ConfigError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_run_config_from_args() {
        let config =
            RunConfig::from_args("http://127.0.0.1:3000/", "1024", "Buffer", Tuning::default())
                .unwrap();
        assert_eq!(config.body.size.bytes(), 1024);
        assert_eq!(config.body.kind, BodyKind::Buffer);
    }

    #[test]
    fn test_run_config_rejects_bad_size() {
        for size in ["3.5", "abc", "-4"] {
            let err =
                RunConfig::from_args("http://127.0.0.1:3000/", size, "buffer", Tuning::default())
                    .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidBodySize { .. }));
        }
    }

    #[test]
    fn test_run_config_rejects_unknown_kind() {
        let err = RunConfig::from_args("http://127.0.0.1:3000/", "16", "xml", Tuning::default())
            .unwrap_err();
        assert!(err.to_string().contains("xml"));
    }
}
