//! Order Aggregate
//!
//! An order is the frozen result of a checkout session: the cart lines, the
//! totals priced at submission time and the promotion reference they used.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, PromotionMechanism};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;
use crate::pricing::{OrderTotals, PricingResult};
use crate::services::{OrderCreateRequest, OrderItemPayload};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: String,
    session_id: String,
    customer_email: String,
    user_id: Option<String>,
    order_number: Option<String>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    totals: OrderTotals,
    coupon_code: Option<String>,
    offer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem { pub line_id: String, pub product_id: String, pub category_id: String, pub quantity: u32, pub unit_price: Money, pub total: Money, pub discount: Money }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Draft, Submitted, Accepted }

impl Order {
    pub fn from_checkout(
        session_id: impl Into<String>,
        customer_email: impl Into<String>,
        user_id: Option<String>,
        cart: &Cart,
        priced: &PricingResult,
        promotion: Option<&PromotionMechanism>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let items = cart.lines().iter().map(|l| {
            let discount = priced.totals.discount_allocation.iter().filter(|a| a.line_id == l.line_id).map(|a| a.line_discount).sum();
            OrderItem {
                line_id: l.line_id.clone(), product_id: l.product_id.clone(), category_id: l.category_id.clone(),
                quantity: l.quantity.value(), unit_price: l.unit_price, total: l.line_total(), discount,
            }
        }).collect();
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7().to_string(), session_id: session_id.into(), customer_email: customer_email.into(), user_id,
            order_number: None, status: OrderStatus::Draft, items, totals: priced.totals.clone(),
            coupon_code: promotion.and_then(PromotionMechanism::coupon_code).map(str::to_string),
            offer_id: promotion.and_then(PromotionMechanism::offer_id).map(str::to_string),
            created_at: now, updated_at: now, events: vec![],
        })
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn totals(&self) -> &OrderTotals { &self.totals }
    pub fn order_number(&self) -> Option<&str> { self.order_number.as_deref() }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn offer_id(&self) -> Option<&str> { self.offer_id.as_deref() }

    pub fn submit(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Draft { return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Submitted }); }
        self.status = OrderStatus::Submitted;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Submitted { order_id: self.id.clone(), session_id: self.session_id.clone(), total: self.totals.total_amount }));
        Ok(())
    }

    pub fn accept(&mut self, order_number: impl Into<String>) -> Result<(), OrderError> {
        if self.status != OrderStatus::Submitted { return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Accepted }); }
        let order_number = order_number.into();
        self.order_number = Some(order_number.clone());
        self.status = OrderStatus::Accepted;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::Accepted { order_id: self.id.clone(), order_number }));
        Ok(())
    }

    /// `subtotal` is the pre-discount amount.
    pub fn to_create_request(&self) -> OrderCreateRequest {
        OrderCreateRequest {
            order_id: self.id.clone(),
            session_id: self.session_id.clone(),
            customer_email: self.customer_email.clone(),
            user_id: self.user_id.clone(),
            items: self.items.iter().map(|i| OrderItemPayload {
                product_id: i.product_id.clone(), category_id: i.category_id.clone(), quantity: i.quantity,
                price: i.unit_price, total: i.total, discount: i.discount,
            }).collect(),
            subtotal: self.totals.original_subtotal,
            discount_amount: self.totals.discount_amount,
            tax_amount: self.totals.tax_amount,
            shipping_amount: self.totals.shipping_amount,
            total_amount: self.totals.total_amount,
            coupon_code: self.coupon_code.clone(),
            offer_id: self.offer_id.clone(),
            discount_allocation: self.totals.discount_allocation.clone(),
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("cannot move order from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
