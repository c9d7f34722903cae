// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker connection handle.
//!
//! One `Broker` owns at most one AMQP connection plus a cached publish
//! channel. Publish errors invalidate the cache so the next call
//! reconnects lazily; consumers get dedicated channels.

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions};
use lapin::tcp::OwnedTLSConfig;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tokio::sync::Mutex;

/// AMQP delivery mode 2: persistent.
const DELIVERY_PERSISTENT: u8 = 2;

#[derive(Default)]
struct State {
    conn: Option<Connection>,
    publish_channel: Option<Channel>,
}

pub struct Broker {
    config: BrokerConfig,
    state: Mutex<State>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config, state: Mutex::new(State::default()) }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Quick reachability check: one connect-and-close attempt.
    ///
    /// The dispatcher uses this to decide between broker dispatch and the
    /// local-subprocess fallback.
    pub async fn probe(config: &BrokerConfig) -> bool {
        match connect_once(config).await {
            Ok(conn) => {
                let _ = conn.close(0, "probe").await;
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "broker not reachable");
                false
            }
        }
    }

    /// Establish the connection, retrying per the configured budget.
    pub async fn connect_with_retry(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        if state.conn.as_ref().is_some_and(|c| c.status().connected()) {
            return Ok(());
        }

        let mut last: Option<lapin::Error> = None;
        for attempt in 1..=self.config.connect_attempts {
            match connect_once(&self.config).await {
                Ok(conn) => {
                    tracing::info!(
                        attempt,
                        tls = self.config.is_tls(),
                        "connected to broker"
                    );
                    state.conn = Some(conn);
                    state.publish_channel = None;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max = self.config.connect_attempts,
                        error = %e,
                        "broker connection attempt failed"
                    );
                    last = Some(e);
                    if attempt < self.config.connect_attempts {
                        tokio::time::sleep(self.config.connect_delay).await;
                    }
                }
            }
        }
        Err(BrokerError::Unavailable {
            attempts: self.config.connect_attempts,
            last: last.unwrap_or(lapin::Error::InvalidConnectionState(
                lapin::ConnectionState::Closed,
            )),
        })
    }

    /// Dedicated channel (consumers, declaration passes). Connects lazily
    /// with a single attempt; callers that need patience call
    /// [`Self::connect_with_retry`] first.
    pub async fn create_channel(&self) -> Result<Channel, BrokerError> {
        let mut state = self.state.lock().await;
        let conn = ensure_conn(&mut state, &self.config).await?;
        Ok(conn.create_channel().await?)
    }

    /// Publish a persistent `application/json` message and wait for the
    /// broker's confirm. On failure the cached channel is dropped so the
    /// next publish reconnects.
    pub async fn publish_persistent(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let result = self.try_publish(exchange, routing_key, payload).await;
        if result.is_err() {
            self.invalidate().await;
        }
        result
    }

    async fn try_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let channel = self.publish_channel().await?;
        let confirm = channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(DELIVERY_PERSISTENT)
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;
        if confirm.is_nack() {
            return Err(BrokerError::NotConfirmed {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
            });
        }
        Ok(())
    }

    async fn publish_channel(&self) -> Result<Channel, BrokerError> {
        let mut state = self.state.lock().await;
        if let Some(channel) = state.publish_channel.as_ref() {
            if channel.status().connected() {
                return Ok(channel.clone());
            }
            state.publish_channel = None;
        }
        let conn = ensure_conn(&mut state, &self.config).await?;
        let channel = conn.create_channel().await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;
        state.publish_channel = Some(channel.clone());
        Ok(channel)
    }

    /// Start consuming from a queue with the given unacked-message window.
    /// Returns the consumer and its channel (acks go through deliveries;
    /// the channel is needed for teardown decisions).
    pub async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
        prefetch: u16,
    ) -> Result<(Channel, Consumer), BrokerError> {
        let channel = self.create_channel().await?;
        channel.basic_qos(prefetch, BasicQosOptions::default()).await?;
        let consumer = channel
            .basic_consume(queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await?;
        Ok((channel, consumer))
    }

    /// Drop the cached connection and channel. The next operation
    /// reconnects from scratch.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.publish_channel = None;
        state.conn = None;
    }

    /// Close the connection for shutdown.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.publish_channel = None;
        if let Some(conn) = state.conn.take() {
            let _ = conn.close(0, "shutdown").await;
        }
    }
}

async fn ensure_conn<'a>(
    state: &'a mut State,
    config: &BrokerConfig,
) -> Result<&'a Connection, BrokerError> {
    let connected = state.conn.as_ref().is_some_and(|c| c.status().connected());
    if !connected {
        state.conn = Some(connect_once(config).await?);
        state.publish_channel = None;
    }
    match state.conn.as_ref() {
        Some(conn) => Ok(conn),
        None => unreachable!("connection just established"),
    }
}

/// One connection attempt, honoring the TLS posture.
async fn connect_once(config: &BrokerConfig) -> Result<Connection, lapin::Error> {
    let url = config.effective_url();
    let options = ConnectionProperties::default();
    if config.is_tls() {
        // Verify the broker certificate against the configured CA.
        // Hostname verification stays relaxed to the TLS backend's URI
        // handling: service names in container networks rarely match
        // certificate SANs.
        let tls = tls_config(config);
        Connection::connect_with_config(&url, options, tls).await
    } else {
        Connection::connect(&url, options).await
    }
}

fn tls_config(config: &BrokerConfig) -> OwnedTLSConfig {
    match std::fs::read_to_string(&config.ca_cert) {
        Ok(pem) => {
            tracing::debug!(ca = %config.ca_cert.display(), "verifying broker cert against CA");
            OwnedTLSConfig { identity: None, cert_chain: Some(pem) }
        }
        Err(e) => {
            // Encrypted but unverified. Protects against passive
            // eavesdropping only.
            tracing::warn!(
                ca = %config.ca_cert.display(),
                error = %e,
                "CA cert not found — skipping broker cert verification"
            );
            OwnedTLSConfig { identity: None, cert_chain: None }
        }
    }
}
