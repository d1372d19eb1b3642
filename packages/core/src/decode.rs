//! Decoding raw queue payloads into validated orders.

use serde_json::Value;

use crate::{Envelope, Order, OrderError};

/// Errors produced while turning a payload into an [`Order`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("malformed order: {0}")]
    Order(#[source] serde_json::Error),

    #[error("invalid order: {0}")]
    Invalid(#[from] OrderError),
}

/// Two-stage decoder for order payloads.
///
/// A payload is either a bare order object or an [`Envelope`] whose
/// `Message` field holds the serialized order. Envelopes are unwrapped one
/// level only.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderDecoder;

impl OrderDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode and validate an order from raw payload bytes.
    pub fn decode(&self, raw: &[u8]) -> Result<Order, DecodeError> {
        let value: Value = serde_json::from_slice(raw).map_err(DecodeError::Json)?;

        let mut order: Order = if is_envelope(&value) {
            let envelope: Envelope =
                serde_json::from_value(value).map_err(DecodeError::Envelope)?;
            serde_json::from_str(&envelope.message).map_err(DecodeError::Order)?
        } else {
            serde_json::from_value(value).map_err(DecodeError::Order)?
        };

        order.validate()?;
        order.reset_status();
        Ok(order)
    }
}

fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("Message"))
}
