use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A fact about an order, written to the outbox in the same unit of work
/// as the order change that produced it.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OrderEvent {
    pub id: Uuid,
    pub order_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: OrderEventKind,
}

impl OrderEvent {
    pub fn new(order_id: &str, kind: OrderEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    /// Topic-style name used as the message key suffix and in relay logs
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEventKind {
    OrderCreated {
        buyer_id: String,
        seller_id: String,
        item_id: Uuid,
        quantity: u32,
        total_amount: i64,
        currency: String,
    },
    StatusChanged {
        from: String,
        to: String,
        actor: String,
    },
    EscrowCreated {
        escrow_id: String,
        transaction_ref: String,
    },
    PaymentReleased {
        escrow_id: String,
        transaction_ref: String,
    },
    PaymentRefunded {
        escrow_id: String,
        transaction_ref: String,
    },
    DisputeRaised {
        raised_by: String,
        reason: String,
    },
    DisputeResolved {
        resolved_by: String,
        refund_buyer: bool,
    },
    RatingSubmitted {
        rated_by: String,
        rated_user: String,
        rating: u8,
    },
}

impl OrderEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            OrderEventKind::OrderCreated { .. } => "order.created",
            OrderEventKind::StatusChanged { .. } => "order.status_changed",
            OrderEventKind::EscrowCreated { .. } => "escrow.created",
            OrderEventKind::PaymentReleased { .. } => "payment.released",
            OrderEventKind::PaymentRefunded { .. } => "payment.refunded",
            OrderEventKind::DisputeRaised { .. } => "dispute.raised",
            OrderEventKind::DisputeResolved { .. } => "dispute.resolved",
            OrderEventKind::RatingSubmitted { .. } => "rating.submitted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = OrderEvent::new(
            "ORD-1-abc",
            OrderEventKind::StatusChanged {
                from: "pending".to_string(),
                to: "confirmed".to_string(),
                actor: "seller-1".to_string(),
            },
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "status_changed");
        assert_eq!(value["order_id"], "ORD-1-abc");
        assert_eq!(value["to"], "confirmed");
        assert_eq!(event.name(), "order.status_changed");
    }
}
