//! In-process event bus backed by `tokio::sync::broadcast`, used in tests and
//! single-process deployments that don't configure `REDIS_URL` (ambient
//! infrastructure, see SPEC_FULL.md §4.3).

use async_trait::async_trait;
use outpost_common::StepEvent;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{BusMessage, EventBus, EventSubscription};

const CHANNEL_CAPACITY: usize = 256;

pub struct BroadcastEventBus {
    channels: Mutex<HashMap<Uuid, broadcast::Sender<BusMessage>>>,
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastEventBus {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, job_id: Uuid) -> broadcast::Sender<BusMessage> {
        let mut channels = self.channels.lock().expect("broadcast bus mutex poisoned");
        channels
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

struct BroadcastSubscription {
    receiver: broadcast::Receiver<BusMessage>,
}

#[async_trait]
impl EventSubscription for BroadcastSubscription {
    async fn next(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, job_id: Uuid, event: StepEvent) {
        let raw_json = match serde_json::to_string(&event) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize step event, dropping publish");
                return;
            }
        };

        let sender = self.sender_for(job_id);
        // No subscribers is not a failure: the event simply has no audience yet.
        let _ = sender.send(BusMessage { raw_json, event });
    }

    async fn subscribe(&self, job_id: Uuid) -> Box<dyn EventSubscription> {
        let sender = self.sender_for(job_id);
        Box::new(BroadcastSubscription {
            receiver: sender.subscribe(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_common::{StepName, StepStatus};

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = BroadcastEventBus::new();
        let job_id = Uuid::new_v4();
        let mut sub = bus.subscribe(job_id).await;

        bus.publish(job_id, StepEvent::new(StepName::Waf, StepStatus::Started))
            .await;

        let msg = sub.next().await.expect("expected a message");
        assert_eq!(msg.event.step, StepName::Waf);
        assert_eq!(msg.event.status, StepStatus::Started);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = BroadcastEventBus::new();
        bus.publish(Uuid::new_v4(), StepEvent::new(StepName::Pipeline, StepStatus::Completed))
            .await;
    }
}
