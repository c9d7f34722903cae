// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exchange and queue topology.
//!
//! Every declaration in the system lives in this module. Re-declaration is
//! parameter-identical by construction: the dispatcher's pre-declare and
//! the consumer's declare both call [`declare_result_queue`].

use crate::error::BrokerError;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use muninn_core::{QueueType, ScanId};

/// Topic exchange carrying all per-scan result traffic.
pub const RESULT_EXCHANGE: &str = "scan.results";

/// Message TTL on per-scan queues: 24 hours.
pub const RESULT_TTL_MS: u32 = 86_400_000;

/// Name of the per-scan result queue for a scan.
pub fn result_queue_name(scan_id: &ScanId) -> String {
    format!("scan.results.{scan_id}")
}

/// Declare both task queues (durable classic queues). Idempotent.
pub async fn declare_task_queues(channel: &Channel) -> Result<(), BrokerError> {
    for queue in [QueueType::Fast, QueueType::Slow] {
        channel
            .queue_declare(
                queue.queue_name(),
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
    }
    Ok(())
}

/// Declare the durable topic exchange for results.
pub async fn declare_result_exchange(channel: &Channel) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            RESULT_EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Declare and bind one scan's result queue.
///
/// Durable, non-exclusive, no auto-delete, 24 h message TTL, bound with
/// routing key exactly `{scan_id}`. The topic exchange drops messages
/// routed while no queue is bound, so the dispatcher calls this *before*
/// publishing the task and the consumer calls it again (identically) when
/// it starts.
pub async fn declare_result_queue(channel: &Channel, scan_id: &ScanId) -> Result<String, BrokerError> {
    declare_result_exchange(channel).await?;

    let name = result_queue_name(scan_id);
    let mut args = FieldTable::default();
    args.insert("x-message-ttl".into(), AMQPValue::LongInt(RESULT_TTL_MS as i32));

    channel
        .queue_declare(
            &name,
            QueueDeclareOptions {
                durable: true,
                exclusive: false,
                auto_delete: false,
                ..Default::default()
            },
            args,
        )
        .await?;
    channel
        .queue_bind(
            &name,
            RESULT_EXCHANGE,
            scan_id.as_str(),
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
    Ok(name)
}

/// Delete one scan's result queue. Only called on a clean terminal:
/// premature deletion would strand a late `FINISHED` with nowhere to land.
pub async fn delete_result_queue(channel: &Channel, scan_id: &ScanId) -> Result<(), BrokerError> {
    channel
        .queue_delete(&result_queue_name(scan_id), QueueDeleteOptions::default())
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "topology_tests.rs"]
mod tests;
