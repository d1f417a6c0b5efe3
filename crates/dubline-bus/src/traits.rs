use crate::error::BusResult;
use async_trait::async_trait;
use dubline_core::StageEnvelope;
use futures::stream::BoxStream;

/// What to do with a nacked delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackAction {
    /// The handler classified the failure as retryable; redeliver.
    Requeue,
    /// The handler classified the failure as terminal; do not redeliver.
    Discard,
}

/// A single inbound delivery plus the handle needed to ack/nack it.
///
/// The acker is bound to the channel the message arrived on — AMQP
/// delivery tags are only meaningful within their originating channel, so
/// acks/nacks must go through this handle rather than a fresh channel.
pub struct Delivery {
    pub envelope: StageEnvelope,
    pub(crate) acker: lapin::acker::Acker,
}

impl Delivery {
    pub fn new(envelope: StageEnvelope, acker: lapin::acker::Acker) -> Self {
        Self { envelope, acker }
    }
}

/// A topic-exchange broker contract (§4.2). Every published message is
/// persistent and carries a timestamp. Publish opens a short-lived channel
/// per call bounded by a 5-second timeout; consume uses one long-lived
/// channel with manual acknowledgement and a bounded prefetch.
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    async fn publish(&self, routing_key: &str, envelope: &StageEnvelope) -> BusResult<()>;

    /// Binds `binding_pattern` (e.g. `task.*`) on the durable topic
    /// exchange and returns a stream of deliveries from one long-lived
    /// channel with a bounded prefetch.
    async fn consume(&self, binding_pattern: &str) -> BusResult<BoxStream<'static, Delivery>>;

    async fn ack(&self, delivery: &Delivery) -> BusResult<()>;

    async fn nack(&self, delivery: &Delivery, action: NackAction) -> BusResult<()>;
}
