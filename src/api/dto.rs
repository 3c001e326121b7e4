//! Request and response bodies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::checkout::{ApplyOutcome, CheckoutSession};
use crate::domain::aggregates::{CartLine, PromotionMechanism};
use crate::domain::value_objects::{Money, Quantity};
use crate::pricing::{PricingResult, PromotionRejection, PromotionState};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub category_id: String,
    pub unit_price: Decimal,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: u32,
}

impl LineRequest {
    pub fn to_line(&self) -> crate::Result<CartLine> {
        Ok(CartLine::new(self.product_id.trim(), self.category_id.trim(), Money::try_new(self.unit_price)?, Quantity::new(self.quantity)?))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub customer_id: Option<String>,
    #[serde(default)]
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest { pub quantity: i64 }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOfferRequest {
    #[validate(length(min = 1))]
    pub offer_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[validate(email)]
    pub customer_email: String,
    pub user_id: Option<String>,
}

/// Stateless pricing of a cart with an already-known promotion definition.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[validate(length(min = 1))]
    pub items: Vec<LineRequest>,
    pub promotion: Option<PromotionMechanism>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub pricing: PricingResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<PromotionRejection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub version: u64,
    pub lines: Vec<CartLine>,
    pub promotion: PromotionState,
    pub pricing: PricingResult,
}

impl From<&CheckoutSession> for SessionView {
    fn from(s: &CheckoutSession) -> Self {
        Self {
            id: s.id().to_string(),
            version: s.version(),
            lines: s.cart().lines().to_vec(),
            promotion: s.promotion().clone(),
            pricing: s.pricing().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub outcome: ApplyOutcome,
    pub session: SessionView,
}
