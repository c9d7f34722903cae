// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane configuration.
//!
//! Environment variables carry deployment wiring (paths, addresses,
//! timeouts); the optional `muninn.toml` in the data directory carries
//! operator policy — most importantly the slow-module set that drives
//! queue classification.

use crate::env;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Modules that route a scan to `scans.slow` out of the box: brute force,
/// crawling, and port scanning dominate wall clock wherever they appear.
const DEFAULT_SLOW_MODULES: &[&str] =
    &["m_portscan_tcp", "m_spider", "m_dnsbrute", "m_accounts", "m_filemeta"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// On-disk shape of `muninn.toml`. Everything is optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    slow_modules: Option<Vec<String>>,
    #[serde(default)]
    correlation: CorrelationFile,
}

#[derive(Debug, Default, Deserialize)]
struct CorrelationFile {
    rules_dir: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub listen_addr: String,
    pub api_url: String,
    /// Modules whose presence classifies a scan onto the slow queue.
    pub slow_modules: BTreeSet<String>,
    /// Heartbeat silence before a worker is marked offline.
    pub worker_stale: Duration,
    /// Offline duration before a worker row is deleted.
    pub worker_cleanup: Duration,
    /// Correlation rules directory.
    pub rules_dir: PathBuf,
    /// Correlation subprocess wall clock.
    pub correlation_timeout: Duration,
}

impl ServerConfig {
    /// Load from the environment plus the optional `muninn.toml` in the
    /// data directory.
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = env::data_path();
        let file = read_config_file(&data_dir.join("muninn.toml"))?;

        let slow_modules = file
            .slow_modules
            .map(|mods| mods.into_iter().collect())
            .unwrap_or_else(|| DEFAULT_SLOW_MODULES.iter().map(|m| m.to_string()).collect());

        Ok(Self {
            listen_addr: env::listen_addr(),
            api_url: env::api_url(),
            slow_modules,
            worker_stale: Duration::from_secs(60),
            worker_cleanup: env::worker_cleanup_timeout(),
            rules_dir: file
                .correlation
                .rules_dir
                .unwrap_or_else(|| data_dir.join("correlation-rules")),
            correlation_timeout: file
                .correlation
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(15 * 60)),
            data_dir,
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
