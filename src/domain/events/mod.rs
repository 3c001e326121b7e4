//! Domain events
use serde::Serialize;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEvent {
    Checkout(CheckoutEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// Subject suffix used when publishing.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Checkout(CheckoutEvent::PromotionApplied { .. }) => "promotion_applied",
            Self::Checkout(CheckoutEvent::PromotionRejected { .. }) => "promotion_rejected",
            Self::Checkout(CheckoutEvent::PromotionRemoved { .. }) => "promotion_removed",
            Self::Checkout(CheckoutEvent::StaleResponseDiscarded { .. }) => "stale_response_discarded",
            Self::Order(OrderEvent::Submitted { .. }) => "order_submitted",
            Self::Order(OrderEvent::Accepted { .. }) => "order_accepted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CheckoutEvent {
    PromotionApplied { session_id: String, kind: String, reference: String, discount: Money },
    PromotionRejected { session_id: String, kind: String, reference: String, reason: String },
    PromotionRemoved { session_id: String, kind: String, reference: String },
    StaleResponseDiscarded { session_id: String, token: u64, current: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OrderEvent {
    Submitted { order_id: String, session_id: String, total: Money },
    Accepted { order_id: String, order_number: String },
}
