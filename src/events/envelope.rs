//! Message envelope (spec §4.1 publisher contract, §6 message payload schema).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::routing::RoutingKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headers {
    pub message_id: Uuid,
    pub correlation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub content_type: String,
}

impl Headers {
    pub fn new(correlation_id: Uuid) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            correlation_id,
            timestamp: Utc::now(),
            content_type: "application/json".to_string(),
        }
    }
}

/// A fully-formed message ready for `EventFabric::publish`. `payload` is the
/// already-serialized JSON body; callers build this via `Envelope::wrap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub routing_key: RoutingKey,
    pub headers: Headers,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn wrap<T: Serialize>(
        routing_key: RoutingKey,
        correlation_id: Uuid,
        payload: &T,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            routing_key,
            headers: Headers::new(correlation_id),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// The idempotency key handlers MUST dedupe on: (messageId, routingKey).
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.headers.message_id, self.routing_key.as_str())
    }
}
