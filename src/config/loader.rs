// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_WORKER_COUNT};
use crate::dispatch::{DispatchMode, RemoteWait};
use crate::engine::executor::default_concurrency;
use crate::engine::ExecutorSettings;
use crate::errors::ConfigError;
use crate::observability::messages::validation::ConfigLoaded;
use crate::observability::messages::StructuredLog;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Engine configuration.
///
/// Controls where node calls run and how the executor schedules them. The
/// graph itself is built in code; only engine behavior is configured.
///
/// # Fields
/// * `mode` - `local` runs units in-process, `remote` ships calls to workers
/// * `block_until_done` - Default waiting behavior of `run`
/// * `executor_options` - Scheduling options
/// * `remote` - Remote dispatch options (ignored in local mode)
///
/// # Example
/// ```yaml
/// mode: remote
/// block_until_done: true
/// executor_options:
///   max_concurrency: 4
///   retry_attempts: 1
/// remote:
///   wait: poll
///   poll_interval_ms: 50
///   timeout_seconds: 30
///   workers: 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: DispatchMode,
    #[serde(default = "default_block_until_done")]
    pub block_until_done: bool,
    #[serde(default)]
    pub executor_options: ExecutorOptions,
    #[serde(default)]
    pub remote: RemoteConfig,
}

fn default_block_until_done() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Local,
            block_until_done: default_block_until_done(),
            executor_options: ExecutorOptions::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Executor settings with built-in defaults filled in.
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            max_concurrency: self.executor_options.max_concurrency.unwrap_or_else(default_concurrency),
            retry_attempts: self.executor_options.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
        }
    }
}

/// Executor-specific configuration options.
///
/// # Fields
/// * `max_concurrency` - Nodes in flight at once (default: available parallelism)
/// * `retry_attempts` - Extra attempts for a failed call (default: 0)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOptions {
    pub max_concurrency: Option<usize>,
    pub retry_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    Block,
    #[default]
    Poll,
}

/// Remote dispatch options.
///
/// # Fields
/// * `wait` - `block` awaits each call, `poll` checks its status periodically
/// * `poll_interval_ms` - Interval between status checks (default: 50)
/// * `timeout_seconds` - Upper bound on a single call (default: none)
/// * `workers` - Size of the reference worker pool (default: 2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub wait: WaitStrategy,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_workers() -> usize {
    DEFAULT_WORKER_COUNT
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            wait: WaitStrategy::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_seconds: None,
            workers: DEFAULT_WORKER_COUNT,
        }
    }
}

impl RemoteConfig {
    pub fn remote_wait(&self) -> RemoteWait {
        match self.wait {
            WaitStrategy::Block => RemoteWait::Block,
            WaitStrategy::Poll => RemoteWait::Poll(Duration::from_millis(self.poll_interval_ms)),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// Load a config from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let content = fs::read_to_string(path)?;
    let cfg: EngineConfig = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "toml" => toml::from_str(&content)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };

    let settings = cfg.executor_settings();
    let mode = cfg.mode.to_string();
    ConfigLoaded {
        path: &path.display().to_string(),
        mode: &mode,
        max_concurrency: settings.max_concurrency,
    }
    .log();
    Ok(cfg)
}

/// Check configured values against their allowed ranges.
///
/// Every problem is collected so a broken file can be fixed in one pass.
pub fn validate_config(cfg: &EngineConfig) -> Result<(), ConfigError> {
    let mut problems = Vec::new();

    if cfg.executor_options.max_concurrency == Some(0) {
        problems.push("executor_options.max_concurrency must be greater than 0".to_string());
    }
    if cfg.remote.poll_interval_ms == 0 {
        problems.push("remote.poll_interval_ms must be greater than 0".to_string());
    }
    if cfg.remote.timeout_seconds == Some(0) {
        problems.push("remote.timeout_seconds must be greater than 0 when set".to_string());
    }
    if cfg.mode == DispatchMode::Remote && cfg.remote.workers == 0 {
        problems.push("remote.workers must be greater than 0 in remote mode".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}

/// Load and validate a config file
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let cfg = load_config(path)?;
    validate_config(&cfg)?;
    Ok(cfg)
}
