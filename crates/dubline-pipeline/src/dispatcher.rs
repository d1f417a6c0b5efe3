//! Consumes every stage's routing key off one binding, decodes the
//! envelope, and exhaustively dispatches to the matching handler.

use crate::context::HandlerContext;
use crate::handlers;
use crate::retry::{retry_with_policy, should_redeliver, RetryConfig};
use crate::task_state::TaskStateMachine;
use dubline_bus::{MessageBus, NackAction};
use dubline_core::{PipelineError, StageEnvelope, StageName};
use futures::StreamExt;
use std::sync::Arc;

const BINDING_PATTERN: &str = "task.*";

pub struct StageDispatcher {
    ctx: Arc<HandlerContext>,
    retry: RetryConfig,
}

impl StageDispatcher {
    pub fn new(ctx: Arc<HandlerContext>, retry: RetryConfig) -> Self {
        Self { ctx, retry }
    }

    /// Pulls cancellation from `ctx.cancel` rather than taking a parameter,
    /// so every handler sharing this context races the same token (§5).
    pub async fn run(&self) -> Result<(), PipelineError> {
        let mut deliveries = self.ctx.bus.consume(BINDING_PATTERN).await?;
        let cancel = self.ctx.cancel.clone();

        loop {
            let delivery = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("dispatcher shutting down on cancellation");
                    return Ok(());
                }
                next = deliveries.next() => match next {
                    Some(d) => d,
                    None => {
                        tracing::warn!("delivery stream ended");
                        return Ok(());
                    }
                },
            };

            let task_id = delivery.envelope.task_id;
            let step = delivery.envelope.step;
            let attempt = delivery.envelope.attempt;
            let state = TaskStateMachine::new(self.ctx.tasks.as_ref());

            if let Err(e) = state.mark_started(task_id).await {
                tracing::error!(%task_id, error = %e, "failed to mark task started");
            }

            let ctx = self.ctx.clone();
            let payload = delivery.envelope.payload.clone();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineError::Canceled),
                result = retry_with_policy(&self.retry, || {
                    let ctx = ctx.clone();
                    let payload = payload.clone();
                    async move { dispatch_one(&ctx, task_id, step, payload).await }
                }) => result,
            };

            match result {
                Ok(()) => {
                    if let Err(e) = self.ctx.bus.ack(&delivery).await {
                        tracing::error!(%task_id, error = %e, "failed to ack delivery");
                    }
                }
                Err(PipelineError::Canceled) => {
                    tracing::info!(%task_id, stage = ?step, "processing canceled, requeuing for another worker");
                    if let Err(nack_err) = self.ctx.bus.nack(&delivery, NackAction::Requeue).await {
                        tracing::error!(%task_id, error = %nack_err, "failed to nack delivery");
                    }
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    if should_redeliver(attempt, self.retry.max_redeliveries) {
                        tracing::warn!(%task_id, stage = ?step, attempt, error = %e, "retryable failure, redelivering with incremented attempt");
                        let redelivered: StageEnvelope = delivery.envelope.clone().with_incremented_attempt();
                        let republished = self.ctx.bus.publish(step.routing_key(), &redelivered).await;
                        match republished {
                            Ok(()) => {
                                if let Err(ack_err) = self.ctx.bus.ack(&delivery).await {
                                    tracing::error!(%task_id, error = %ack_err, "failed to ack original delivery after redelivering");
                                }
                            }
                            Err(publish_err) => {
                                tracing::error!(%task_id, error = %publish_err, "failed to publish redelivery, falling back to native requeue");
                                if let Err(nack_err) = self.ctx.bus.nack(&delivery, NackAction::Requeue).await {
                                    tracing::error!(%task_id, error = %nack_err, "failed to nack delivery");
                                }
                            }
                        }
                    } else {
                        tracing::error!(%task_id, stage = ?step, attempt, error = %e, "retry budget exhausted, failing task");
                        if let Err(state_err) = state.mark_failed(task_id, &e.to_string()).await {
                            tracing::error!(%task_id, error = %state_err, "failed to record task failure");
                        }
                        if let Err(nack_err) = self.ctx.bus.nack(&delivery, NackAction::Discard).await {
                            tracing::error!(%task_id, error = %nack_err, "failed to nack delivery");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(%task_id, stage = ?step, error = %e, "terminal failure");
                    if let Err(state_err) = state.mark_failed(task_id, &e.to_string()).await {
                        tracing::error!(%task_id, error = %state_err, "failed to record task failure");
                    }
                    if let Err(nack_err) = self.ctx.bus.nack(&delivery, NackAction::Discard).await {
                        tracing::error!(%task_id, error = %nack_err, "failed to nack delivery");
                    }
                }
            }
        }
    }
}

async fn dispatch_one(
    ctx: &HandlerContext,
    task_id: uuid::Uuid,
    step: StageName,
    payload: serde_json::Value,
) -> Result<(), PipelineError> {
    match step {
        StageName::ExtractAudio => {
            let payload = serde_json::from_value(payload)?;
            handlers::extract_audio::handle(ctx, task_id, &payload).await
        }
        StageName::Asr => {
            let payload = serde_json::from_value(payload)?;
            handlers::asr::handle(ctx, task_id, &payload).await
        }
        StageName::Translate => {
            let payload = serde_json::from_value(payload)?;
            handlers::translate::handle(ctx, task_id, &payload).await
        }
        StageName::Tts => {
            let payload = serde_json::from_value(payload)?;
            handlers::tts::handle(ctx, task_id, &payload).await
        }
        StageName::MuxVideo => {
            let payload = serde_json::from_value(payload)?;
            handlers::mux_video::handle(ctx, task_id, &payload).await
        }
    }
}
