//! External collaborators of the pricing engine.
//!
//! Coupon validation, offer lookup, tax settings and order creation live in
//! other services; the engine only sees these traits and wire types.

pub mod http;
pub mod memory;
pub mod nats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use crate::config::Config;
use crate::domain::aggregates::{Audience, Cart, Coupon, DiscountKind, Offer};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Money, Percentage, ValueError};
use crate::pricing::{LineAllocation, TaxPolicy};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { ServiceError::Decode(e.to_string()) } else { ServiceError::Transport(e.to_string()) }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidationRequest {
    pub code: String,
    pub order_amount: Money,
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPayload {
    pub code: String,
    pub discount_type: DiscountKind,
    pub value: Decimal,
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub min_order_amount: Option<Money>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub used_count: Option<u32>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub audience: Option<Audience>,
}

impl From<CouponPayload> for Coupon {
    fn from(p: CouponPayload) -> Self {
        Coupon {
            code: p.code, discount_type: p.discount_type, value: p.value,
            min_order_amount: p.min_order_amount.unwrap_or_default(), max_discount: p.max_discount,
            usage_limit: p.usage_limit, used_count: p.used_count.unwrap_or_default(),
            valid_from: p.valid_from, valid_to: p.valid_to, audience: p.audience.unwrap_or_default(),
        }
    }
}

impl From<&Coupon> for CouponPayload {
    fn from(c: &Coupon) -> Self {
        CouponPayload {
            code: c.code.clone(), discount_type: c.discount_type, value: c.value, max_discount: c.max_discount,
            min_order_amount: Some(c.min_order_amount), usage_limit: c.usage_limit, used_count: Some(c.used_count),
            valid_from: c.valid_from, valid_to: c.valid_to, audience: Some(c.audience),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidationResponse {
    pub valid: bool,
    pub coupon: Option<CouponPayload>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCartItem {
    pub product_id: String,
    pub category_id: String,
    pub price: Money,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCalculationRequest {
    pub offer_id: String,
    pub cart_items: Vec<OfferCartItem>,
}

impl OfferCalculationRequest {
    pub fn for_cart(offer_id: impl Into<String>, cart: &Cart) -> Self {
        Self {
            offer_id: offer_id.into(),
            cart_items: cart.lines().iter().map(|l| OfferCartItem {
                product_id: l.product_id.clone(), category_id: l.category_id.clone(), price: l.unit_price, quantity: l.quantity.value(),
            }).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountedItem {
    pub product_id: String,
    pub quantity: u32,
    pub discount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCalculationResponse {
    pub success: bool,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub discounted_items: Vec<DiscountedItem>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettings {
    pub tax_enabled: bool,
    pub tax_rate: Decimal,
}

impl TryFrom<TaxSettings> for TaxPolicy {
    type Error = ValueError;
    fn try_from(s: TaxSettings) -> Result<Self, Self::Error> {
        Ok(TaxPolicy { enabled: s.tax_enabled, rate_percent: Percentage::new(s.tax_rate)? })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemPayload {
    pub product_id: String,
    pub category_id: String,
    pub quantity: u32,
    pub price: Money,
    pub total: Money,
    pub discount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateRequest {
    pub order_id: String,
    pub session_id: String,
    pub customer_email: String,
    pub user_id: Option<String>,
    pub items: Vec<OrderItemPayload>,
    /// Pre-discount subtotal.
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub shipping_amount: Money,
    pub total_amount: Money,
    pub coupon_code: Option<String>,
    pub offer_id: Option<String>,
    pub discount_allocation: Vec<LineAllocation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
    pub order_number: String,
}

// =============================================================================
// Collaborator traits
// =============================================================================

#[async_trait]
pub trait CouponValidator: Send + Sync {
    async fn validate(&self, request: &CouponValidationRequest) -> Result<CouponValidationResponse, ServiceError>;
}

#[async_trait]
pub trait OfferService: Send + Sync {
    async fn fetch_offer(&self, offer_id: &str) -> Result<Offer, ServiceError>;
    async fn calculate(&self, request: &OfferCalculationRequest) -> Result<OfferCalculationResponse, ServiceError>;
}

#[async_trait]
pub trait TaxSettingsSource: Send + Sync {
    async fn fetch(&self) -> Result<TaxSettings, ServiceError>;
}

#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn create_order(&self, request: &OrderCreateRequest) -> Result<OrderReceipt, ServiceError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), ServiceError>;
}

/// The full set of collaborators a checkout service runs against.
#[derive(Clone)]
pub struct Services {
    pub coupons: Arc<dyn CouponValidator>,
    pub offers: Arc<dyn OfferService>,
    pub tax: Arc<dyn TaxSettingsSource>,
    pub orders: Arc<dyn OrderSink>,
    pub events: Arc<dyn EventPublisher>,
}

impl Services {
    /// HTTP collaborators where a URL is configured, in-memory ones otherwise.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.service_timeout).build()?;

        let coupons: Arc<dyn CouponValidator> = match &config.coupon_service_url {
            Some(url) => Arc::new(http::HttpCouponValidator::new(client.clone(), url)),
            None => Arc::new(memory::InMemoryCoupons::default()),
        };
        let offers: Arc<dyn OfferService> = match &config.offer_service_url {
            Some(url) => Arc::new(http::HttpOfferService::new(client.clone(), url)),
            None => Arc::new(memory::InMemoryOffers::default()),
        };
        let tax: Arc<dyn TaxSettingsSource> = match &config.tax_settings_url {
            Some(url) => Arc::new(http::HttpTaxSettings::new(client.clone(), url)),
            None => Arc::new(memory::StaticTaxSettings::default()),
        };
        let orders: Arc<dyn OrderSink> = match &config.order_service_url {
            Some(url) => Arc::new(http::HttpOrderSink::new(client, url)),
            None => Arc::new(memory::InMemoryOrderLog::default()),
        };
        let events: Arc<dyn EventPublisher> = match &config.nats_url {
            Some(url) => match async_nats::connect(url.as_str()).await {
                Ok(client) => Arc::new(nats::NatsPublisher::new(client, "checkout.events")),
                Err(e) => {
                    tracing::warn!(error = %e, "NATS unavailable, domain events will only be logged");
                    Arc::new(memory::LogPublisher)
                }
            },
            None => Arc::new(memory::LogPublisher),
        };
        Ok(Self { coupons, offers, tax, orders, events })
    }

    pub fn in_memory() -> Self {
        Self {
            coupons: Arc::new(memory::InMemoryCoupons::default()),
            offers: Arc::new(memory::InMemoryOffers::default()),
            tax: Arc::new(memory::StaticTaxSettings::default()),
            orders: Arc::new(memory::InMemoryOrderLog::default()),
            events: Arc::new(memory::LogPublisher),
        }
    }

    /// Publishes each event; failures are logged, never propagated.
    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            if let Err(e) = self.events.publish(&event).await {
                tracing::warn!(error = %e, kind = event.kind(), "failed to publish domain event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_coupon_validation_response_wire_format() {
        let json = r#"{"valid":true,"coupon":{"code":"SAVE10","discountType":"percentage","value":10,"maxDiscount":"50"}}"#;
        let resp: CouponValidationResponse = serde_json::from_str(json).unwrap();
        let coupon = Coupon::from(resp.coupon.unwrap());
        assert_eq!(coupon.value, dec!(10));
        assert_eq!(coupon.max_discount, Some(Money::from_major(50)));
        assert_eq!(coupon.min_order_amount, Money::ZERO);
        assert!(resp.message.is_none());
    }

    #[test]
    fn test_tax_settings_into_policy() {
        let settings: TaxSettings = serde_json::from_str(r#"{"tax_enabled":true,"tax_rate":18}"#).unwrap();
        let policy = TaxPolicy::try_from(settings).unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.rate_percent.rate(), dec!(18));
        assert!(TaxPolicy::try_from(TaxSettings { tax_enabled: true, tax_rate: dec!(-1) }).is_err());
    }

    #[test]
    fn test_offer_request_mirrors_cart() {
        use crate::domain::aggregates::CartLine;
        use crate::domain::value_objects::Quantity;
        let cart = Cart::from_lines(vec![CartLine::new("E1", "earrings", Money::from_major(100), Quantity::new(2).unwrap())]);
        let req = OfferCalculationRequest::for_cart("bogo", &cart);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["offerId"], "bogo");
        assert_eq!(json["cartItems"][0]["categoryId"], "earrings");
        assert_eq!(json["cartItems"][0]["quantity"], 2);
    }
}
