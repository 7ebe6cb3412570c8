//! Redis-backed event bus. A publish
//! failure is caught and logged here — it must never propagate into the
//! pipeline.

use async_trait::async_trait;
use futures::StreamExt;
use outpost_common::StepEvent;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::{channel_name, BusMessage, EventBus, EventSubscription};

pub struct RedisEventBus {
    client: redis::Client,
    publish_conn: ConnectionManager,
}

impl RedisEventBus {
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let publish_conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            publish_conn,
        })
    }
}

struct RedisSubscription {
    stream: redis::aio::PubSub,
}

#[async_trait]
impl EventSubscription for RedisSubscription {
    async fn next(&mut self) -> Option<BusMessage> {
        let msg = self.stream.on_message().next().await?;
        let raw_json: String = msg.get_payload().ok()?;
        let event: StepEvent = serde_json::from_str(&raw_json).ok()?;
        Some(BusMessage { raw_json, event })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, job_id: Uuid, event: StepEvent) {
        let raw_json = match serde_json::to_string(&event) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize step event, dropping publish");
                return;
            }
        };

        let mut conn = self.publish_conn.clone();
        let channel = channel_name(job_id);
        if let Err(e) = redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(&raw_json)
            .query_async::<_, i64>(&mut conn)
            .await
        {
            tracing::warn!(error = %e, channel, "broker publish failed, continuing without it");
        }
    }

    async fn subscribe(&self, job_id: Uuid) -> Box<dyn EventSubscription> {
        let channel = channel_name(job_id);
        match self.client.get_async_pubsub().await {
            Ok(mut pubsub) => {
                if let Err(e) = pubsub.subscribe(&channel).await {
                    tracing::warn!(error = %e, channel, "broker subscribe failed");
                }
                Box::new(RedisSubscription { stream: pubsub })
            }
            Err(e) => {
                tracing::warn!(error = %e, channel, "broker connection failed for subscribe");
                Box::new(EmptySubscription)
            }
        }
    }
}

/// Returned when the broker is unreachable at subscribe time: an immediately
/// closed stream rather than a panic. Broker failures never propagate.
struct EmptySubscription;

#[async_trait]
impl EventSubscription for EmptySubscription {
    async fn next(&mut self) -> Option<BusMessage> {
        None
    }
}
