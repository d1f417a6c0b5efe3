//! Durable AMQP topic-exchange `MessageBus` implementation.
//!
//! Grounded on the wire-level contract of a topic exchange named
//! `task_exchange`: declared durable, non-auto-deleted, non-internal;
//! publishes are marked `delivery_mode: persistent` and bounded by a
//! 5-second timeout via a short-lived channel per call; consumption opens
//! one long-lived channel per dispatcher with `basic_qos` bounding
//! prefetch and manual acknowledgement.

use crate::error::{BusError, BusResult};
use crate::traits::{Delivery, MessageBus, NackAction};
use async_trait::async_trait;
use dubline_core::StageEnvelope;
use futures::stream::BoxStream;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::message::Delivery as LapinDelivery;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use std::time::Duration;

const EXCHANGE_NAME: &str = "task_exchange";
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AmqpBus {
    connection: Connection,
    prefetch: u16,
}

impl AmqpBus {
    pub async fn connect(url: &str, prefetch: u16) -> BusResult<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Channel(e.to_string()))?;
        declare_exchange(&channel).await?;

        Ok(Self {
            connection,
            prefetch,
        })
    }
}

async fn declare_exchange(channel: &Channel) -> BusResult<()> {
    channel
        .exchange_declare(
            EXCHANGE_NAME,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                auto_delete: false,
                internal: false,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Channel(format!("exchange_declare: {e}")))
}

#[async_trait]
impl MessageBus for AmqpBus {
    async fn publish(&self, routing_key: &str, envelope: &StageEnvelope) -> BusResult<()> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| BusError::Channel(e.to_string()))?;

        let body = serde_json::to_vec(envelope)?;
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2) // persistent
            .with_timestamp(envelope.created_at.timestamp() as u64);

        let publish = channel.basic_publish(
            EXCHANGE_NAME,
            routing_key,
            BasicPublishOptions::default(),
            &body,
            properties,
        );

        match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
            Ok(Ok(confirm)) => confirm
                .await
                .map(|_| ())
                .map_err(|e| BusError::Channel(format!("publish confirm: {e}"))),
            Ok(Err(e)) => Err(BusError::Channel(format!("publish: {e}"))),
            Err(_) => Err(BusError::PublishTimeout(PUBLISH_TIMEOUT)),
        }
    }

    async fn consume(&self, binding_pattern: &str) -> BusResult<BoxStream<'static, Delivery>> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| BusError::Channel(e.to_string()))?;

        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BusError::Channel(format!("basic_qos: {e}")))?;

        let queue_name = queue_name_for_binding(binding_pattern);
        let queue = channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Channel(format!("queue_declare: {e}")))?;

        channel
            .queue_bind(
                queue.name().as_str(),
                EXCHANGE_NAME,
                binding_pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Channel(format!("queue_bind: {e}")))?;

        let consumer = channel
            .basic_consume(
                queue.name().as_str(),
                "dubline-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Channel(format!("basic_consume: {e}")))?;

        let stream = consumer.filter_map(|delivery| async move { decode_delivery(delivery).await });

        Ok(Box::pin(stream))
    }

    async fn ack(&self, delivery: &Delivery) -> BusResult<()> {
        delivery
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BusError::Channel(format!("ack: {e}")))
    }

    async fn nack(&self, delivery: &Delivery, action: NackAction) -> BusResult<()> {
        delivery
            .acker
            .nack(BasicNackOptions {
                requeue: matches!(action, NackAction::Requeue),
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Channel(format!("nack: {e}")))
    }
}

fn queue_name_for_binding(binding_pattern: &str) -> String {
    format!(
        "dubline.{}",
        binding_pattern.replace('*', "all").replace('#', "any")
    )
}

async fn decode_delivery(delivery: lapin::Result<LapinDelivery>) -> Option<Delivery> {
    let delivery = match delivery {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "amqp delivery error, skipping");
            return None;
        }
    };

    match serde_json::from_slice::<StageEnvelope>(&delivery.data) {
        Ok(envelope) => Some(Delivery::new(envelope, delivery.acker)),
        Err(e) => {
            tracing::warn!(error = %e, "malformed envelope, acking without processing");
            let _ = delivery.acker.ack(BasicAckOptions::default()).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_name_is_stable_for_the_all_stages_binding() {
        assert_eq!(queue_name_for_binding("task.*"), "dubline.task.all");
    }
}
