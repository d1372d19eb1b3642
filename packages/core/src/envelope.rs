//! Fan-out envelope carried by messages that went through a pub/sub hop.

use serde::{Deserialize, Serialize};

use crate::Order;

/// A notification envelope wrapping a serialized order.
///
/// Topics that fan out into queues deliver the original payload as a string
/// under `Message`, alongside broker metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "MessageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "Message")]
    pub message: String,
}

impl Envelope {
    /// Wrap an order the way a fan-out topic would before it lands in a queue.
    pub fn wrap(order: &Order) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: Some("Notification".to_string()),
            message_id: Some(order.id().to_string()),
            message: serde_json::to_string(order)?,
        })
    }

    /// Serialize the envelope into queue payload bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
