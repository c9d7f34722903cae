// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default CA certificate location (mounted by the compose files).
pub const DEFAULT_CA_CERT: &str = "/etc/broker/certs/ca.crt";

/// Connect retry budget: 10 attempts, 5 s apart.
pub const CONNECT_ATTEMPTS: u32 = 10;
pub const CONNECT_DELAY: Duration = Duration::from_secs(5);

/// Socket/handshake timeout carried on the AMQP URI.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for one AMQP connection.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// `amqp://` or `amqps://` URL.
    pub url: String,
    /// PEM CA bundle used to verify the broker certificate over TLS.
    pub ca_cert: PathBuf,
    /// Whether AMQP heartbeats are enabled on this connection.
    ///
    /// Must be `false` for any connection whose channel blocks longer than
    /// a heartbeat interval (worker task channels, log-publish channels):
    /// the broker would otherwise kill the connection mid-scan and
    /// redeliver the task.
    pub heartbeat: bool,
    pub connect_attempts: u32,
    pub connect_delay: Duration,
    pub connect_timeout: Duration,
}

impl BrokerConfig {
    /// Build from a URL with heartbeats enabled (control-plane side).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ca_cert: PathBuf::from(DEFAULT_CA_CERT),
            heartbeat: true,
            connect_attempts: CONNECT_ATTEMPTS,
            connect_delay: CONNECT_DELAY,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Read `BROKER_URL`/`BROKER_CA_CERT`. `None` when no URL is set —
    /// broker dispatch is disabled entirely in that case.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("BROKER_URL").ok().filter(|u| !u.is_empty())?;
        let mut config = Self::new(url);
        if let Ok(ca) = std::env::var("BROKER_CA_CERT") {
            if !ca.is_empty() {
                config.ca_cert = PathBuf::from(ca);
            }
        }
        Some(config)
    }

    /// Disable AMQP heartbeats (long-blocking channels; see field docs).
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = false;
        self
    }

    pub fn is_tls(&self) -> bool {
        self.url.starts_with("amqps://")
    }

    /// The URL to actually dial: heartbeat policy and the socket timeout
    /// are carried as AMQP URI query parameters.
    pub fn effective_url(&self) -> String {
        let mut url = self.url.clone();
        let mut push = |param: String| {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str(&param);
        };
        push(format!("connection_timeout={}", self.connect_timeout.as_millis()));
        if !self.heartbeat {
            push("heartbeat=0".to_string());
        }
        url
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
