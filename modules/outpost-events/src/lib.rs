//! Event Bus: publish per-job step lifecycle events to a
//! pub/sub channel `job:{job_id}:events`. Broker failures are non-critical —
//! every implementation here logs and swallows them.

pub mod broadcast;
pub mod redis_bus;

pub use broadcast::BroadcastEventBus;
pub use redis_bus::RedisEventBus;

use async_trait::async_trait;
use outpost_common::StepEvent;
use uuid::Uuid;

pub fn channel_name(job_id: Uuid) -> String {
    format!("job:{job_id}:events")
}

/// A single message as delivered to a subscriber: the raw JSON the
/// publisher serialized, ready to forward verbatim over SSE.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub raw_json: String,
    pub event: StepEvent,
}

#[async_trait]
pub trait EventSubscription: Send {
    /// Wait for the next message, or `None` once the channel is closed.
    async fn next(&mut self) -> Option<BusMessage>;
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Serialize and publish `event` to `job:{job_id}:events`. Never
    /// returns an error to the caller — failures are logged internally.
    async fn publish(&self, job_id: Uuid, event: StepEvent);

    /// Subscribe to a job's channel. Must be callable before the job has
    /// produced any events.
    async fn subscribe(&self, job_id: Uuid) -> Box<dyn EventSubscription>;
}
