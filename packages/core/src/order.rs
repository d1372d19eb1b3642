//! Order domain types for units of work flowing through the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Current status of an order in its processing lifecycle.
///
/// Status only moves forward: `Received -> Processing -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order was accepted by the intake or decoded from the queue.
    #[default]
    #[serde(alias = "accepted", alias = "pending")]
    Received,
    /// Payment is being processed.
    Processing,
    /// Payment succeeded.
    Completed,
    /// Payment failed.
    Failed,
}

impl OrderStatus {
    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }

    /// Check whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Received, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Completed)
                | (OrderStatus::Processing, OrderStatus::Failed)
        )
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, quantity: u32, price: f64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price,
        }
    }

    /// Price times quantity.
    pub fn subtotal(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Validation and lifecycle errors for orders.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("order id must not be empty")]
    MissingId,

    #[error("line item {index} ({product_id}): quantity must be at least 1")]
    InvalidQuantity { index: usize, product_id: String },

    #[error("line item {index} ({product_id}): price must be a non-negative number")]
    InvalidPrice { index: usize, product_id: String },

    #[error("order {order_id}: illegal status transition {from} -> {to}")]
    IllegalTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
}

/// An e-commerce order, the unit of work processed by the payment pipeline.
///
/// The identifier is fixed at construction and the status can only be
/// advanced through [`Order::advance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    order_id: String,
    /// Customer placing the order.
    #[serde(default)]
    pub customer_id: i64,
    #[serde(default)]
    status: OrderStatus,
    /// Ordered line items.
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// When the order was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new received order with a fresh ULID identifier.
    pub fn new(customer_id: i64, items: Vec<LineItem>) -> Self {
        Self::with_id(Ulid::new().to_string(), customer_id, items)
    }

    /// Create a new received order with the given identifier.
    pub fn with_id(order_id: impl Into<String>, customer_id: i64, items: Vec<LineItem>) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id,
            status: OrderStatus::Received,
            items,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.order_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Number of line items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of all line item subtotals.
    pub fn total_value(&self) -> f64 {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    /// Move the order to `next`, rejecting backward or skipping transitions.
    pub fn advance(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::IllegalTransition {
                order_id: self.order_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Check the structural constraints of the order.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.order_id.trim().is_empty() {
            return Err(OrderError::MissingId);
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.quantity < 1 {
                return Err(OrderError::InvalidQuantity {
                    index,
                    product_id: item.product_id.clone(),
                });
            }
            if !item.price.is_finite() || item.price < 0.0 {
                return Err(OrderError::InvalidPrice {
                    index,
                    product_id: item.product_id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Reset the lifecycle of a freshly parsed order.
    ///
    /// Producers write their own status strings; a record entering the
    /// pipeline always starts as `Received`.
    pub(crate) fn reset_status(&mut self) {
        self.status = OrderStatus::Received;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Order {
        Order::with_id(
            "order-1",
            42,
            vec![LineItem::new("PROD-100", 2, 9.5), LineItem::new("PROD-200", 1, 1.0)],
        )
    }

    #[test]
    fn status_moves_forward_only() {
        let mut order = sample();
        assert_eq!(order.status(), OrderStatus::Received);

        assert!(order.advance(OrderStatus::Completed).is_err());
        order.advance(OrderStatus::Processing).unwrap();
        order.advance(OrderStatus::Completed).unwrap();

        let err = order.advance(OrderStatus::Processing).unwrap_err();
        assert!(matches!(err, OrderError::IllegalTransition { .. }));
        assert_eq!(order.status(), OrderStatus::Completed);
        assert!(order.status().is_terminal());
    }

    #[test]
    fn processing_can_fail() {
        let mut order = sample();
        order.advance(OrderStatus::Processing).unwrap();
        order.advance(OrderStatus::Failed).unwrap();
        assert!(order.advance(OrderStatus::Completed).is_err());
    }

    #[test]
    fn totals() {
        let order = sample();
        assert_eq!(order.item_count(), 2);
        assert!((order.total_value() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validation_rejects_bad_items() {
        let mut order = sample();
        order.items[1].quantity = 0;
        assert!(matches!(
            order.validate(),
            Err(OrderError::InvalidQuantity { index: 1, .. })
        ));

        let mut order = sample();
        order.items[0].price = -1.0;
        assert!(matches!(
            order.validate(),
            Err(OrderError::InvalidPrice { index: 0, .. })
        ));

        let order = Order::with_id("  ", 1, Vec::new());
        assert_eq!(order.validate(), Err(OrderError::MissingId));
    }

    #[test]
    fn producer_status_aliases() {
        let status: OrderStatus = serde_json::from_str("\"accepted\"").unwrap();
        assert_eq!(status, OrderStatus::Received);
        let status: OrderStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, OrderStatus::Processing);
    }
}
