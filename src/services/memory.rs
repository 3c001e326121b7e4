//! In-process collaborators for local runs and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use super::{
    CouponPayload, CouponValidationRequest, CouponValidationResponse, CouponValidator, DiscountedItem, EventPublisher,
    OfferCalculationRequest, OfferCalculationResponse, OfferService, OrderCreateRequest, OrderReceipt, OrderSink, ServiceError,
    TaxSettings, TaxSettingsSource,
};
use crate::domain::aggregates::{Cart, CartLine, Coupon, Offer, PromotionMechanism};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Quantity;
use crate::pricing::resolver;

fn unavailable() -> ServiceError { ServiceError::Transport("service unavailable".into()) }

/// Coupon book keyed by upper-cased code.
#[derive(Default)]
pub struct InMemoryCoupons {
    coupons: HashMap<String, Coupon>,
    offline: bool,
}

impl InMemoryCoupons {
    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.coupons.insert(coupon.code.to_uppercase(), coupon);
        self
    }

    /// Every call fails as if the network were down.
    pub fn offline() -> Self { Self { coupons: HashMap::new(), offline: true } }
}

fn rejected(message: impl Into<String>) -> CouponValidationResponse {
    CouponValidationResponse { valid: false, coupon: None, message: Some(message.into()) }
}

#[async_trait]
impl CouponValidator for InMemoryCoupons {
    async fn validate(&self, request: &CouponValidationRequest) -> Result<CouponValidationResponse, ServiceError> {
        if self.offline { return Err(unavailable()); }
        let Some(coupon) = self.coupons.get(&request.code.trim().to_uppercase()) else {
            return Ok(rejected("Invalid coupon code"));
        };
        let now = Utc::now();
        if !coupon.window().contains(now) { return Ok(rejected("Coupon is not valid at this time")); }
        if coupon.is_exhausted() { return Ok(rejected("Coupon usage limit reached")); }
        if request.order_amount < coupon.min_order_amount {
            return Ok(rejected(format!("Minimum order amount is {}", coupon.min_order_amount)));
        }
        Ok(CouponValidationResponse { valid: true, coupon: Some(CouponPayload::from(coupon)), message: None })
    }
}

/// Offer catalog that calculates discounts with the same engine the checkout uses.
#[derive(Default)]
pub struct InMemoryOffers {
    offers: HashMap<String, Offer>,
    offline: bool,
}

impl InMemoryOffers {
    pub fn with_offer(mut self, offer: Offer) -> Self {
        self.offers.insert(offer.id.clone(), offer);
        self
    }

    pub fn offline() -> Self { Self { offers: HashMap::new(), offline: true } }
}

#[async_trait]
impl OfferService for InMemoryOffers {
    async fn fetch_offer(&self, offer_id: &str) -> Result<Offer, ServiceError> {
        if self.offline { return Err(unavailable()); }
        self.offers.get(offer_id).cloned().ok_or_else(|| ServiceError::NotFound(offer_id.to_string()))
    }

    async fn calculate(&self, request: &OfferCalculationRequest) -> Result<OfferCalculationResponse, ServiceError> {
        if self.offline { return Err(unavailable()); }
        let Some(offer) = self.offers.get(&request.offer_id) else {
            return Ok(OfferCalculationResponse { success: false, discount: Default::default(), message: Some("Offer not found".into()), discounted_items: vec![] });
        };
        let mut cart = Cart::new();
        for item in &request.cart_items {
            let Ok(quantity) = Quantity::new(item.quantity) else { continue };
            if let Err(e) = cart.add_line(CartLine::new(item.product_id.clone(), item.category_id.clone(), item.price, quantity)) {
                return Ok(OfferCalculationResponse { success: false, discount: Default::default(), message: Some(e.to_string()), discounted_items: vec![] });
            }
        }
        let now = Utc::now();
        if let Err(rejection) = resolver::validate_offer(offer, &cart, now) {
            return Ok(OfferCalculationResponse { success: false, discount: Default::default(), message: Some(rejection.to_string()), discounted_items: vec![] });
        }
        let outcome = resolver::discount_for(&cart, &PromotionMechanism::Offer(offer.clone()), now);
        Ok(OfferCalculationResponse {
            success: true,
            discount: outcome.amount,
            message: outcome.message.or_else(|| Some("Offer applied".into())),
            discounted_items: outcome.allocation.iter().map(|a| DiscountedItem {
                product_id: a.product_id.clone(), quantity: a.discounted_quantity, discount: a.line_discount,
            }).collect(),
        })
    }
}

#[derive(Default)]
pub struct StaticTaxSettings(pub TaxSettings);

#[async_trait]
impl TaxSettingsSource for StaticTaxSettings {
    async fn fetch(&self) -> Result<TaxSettings, ServiceError> { Ok(self.0) }
}

/// Keeps submitted orders in memory and numbers them sequentially.
#[derive(Default)]
pub struct InMemoryOrderLog {
    orders: Mutex<Vec<OrderCreateRequest>>,
}

impl InMemoryOrderLog {
    pub async fn orders(&self) -> Vec<OrderCreateRequest> { self.orders.lock().await.clone() }
}

#[async_trait]
impl OrderSink for InMemoryOrderLog {
    async fn create_order(&self, request: &OrderCreateRequest) -> Result<OrderReceipt, ServiceError> {
        let mut orders = self.orders.lock().await;
        orders.push(request.clone());
        Ok(OrderReceipt { order_id: request.order_id.clone(), order_number: format!("ORD-{:08}", orders.len()) })
    }
}

/// Writes events to the log instead of a bus.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), ServiceError> {
        let payload = serde_json::to_string(event).map_err(|e| ServiceError::Decode(e.to_string()))?;
        tracing::info!(kind = event.kind(), %payload, "domain event");
        Ok(())
    }
}

/// Collects events for inspection.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub async fn events(&self) -> Vec<DomainEvent> { self.events.lock().await.clone() }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), ServiceError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
