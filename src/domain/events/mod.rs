//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::status::ItemStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
    Payment(PaymentEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, total: Decimal, payment_method: String },
    Cancelled { order_id: Uuid, refund: Decimal },
    ItemCancelled { order_id: Uuid, item_id: Uuid, refund: Decimal },
    ReturnRequested { order_id: Uuid, item_id: Uuid, reason: String },
    ReturnApproved { order_id: Uuid, item_id: Uuid, refund: Decimal },
    ReturnRejected { order_id: Uuid, item_id: Uuid },
    ItemStatusChanged { order_id: Uuid, item_id: Uuid, from: ItemStatus, to: ItemStatus },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    Captured { order_id: Uuid, gateway_payment_id: String },
    Failed { order_id: Uuid },
}

impl DomainEvent {
    /// Subject suffix the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::Cancelled { .. }) => "order.cancelled",
            Self::Order(OrderEvent::ItemCancelled { .. }) => "order.item_cancelled",
            Self::Order(OrderEvent::ReturnRequested { .. }) => "order.return_requested",
            Self::Order(OrderEvent::ReturnApproved { .. }) => "order.return_approved",
            Self::Order(OrderEvent::ReturnRejected { .. }) => "order.return_rejected",
            Self::Order(OrderEvent::ItemStatusChanged { .. }) => "order.item_status_changed",
            Self::Payment(PaymentEvent::Captured { .. }) => "payment.captured",
            Self::Payment(PaymentEvent::Failed { .. }) => "payment.failed",
        }
    }
}
