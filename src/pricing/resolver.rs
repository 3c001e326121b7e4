//! Promotion resolver
//!
//! Owns the single-promotion state machine (`NoPromotion` /
//! `PromotionActive`), validates a mechanism before it becomes active, and
//! assembles [`OrderTotals`] from raw cart state on every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::{Cart, Coupon, Offer, OfferRule, PromotionMechanism, ValidityWindow};
use crate::domain::value_objects::Money;
use crate::pricing::calculators::{self, DiscountOutcome, DiscountStatus, LineAllocation};
use crate::pricing::eligibility;
use crate::pricing::tax_shipping::{self, ShippingPolicy, TaxPolicy};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "promotion", rename_all = "snake_case")]
pub enum PromotionState {
    #[default]
    NoPromotion,
    PromotionActive(PromotionMechanism),
}

/// Why a coupon or offer could not be activated. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PromotionRejection {
    #[error("this promotion has expired")]
    Expired,
    #[error("this promotion is not active yet")]
    NotYetValid,
    #[error("this promotion is no longer available")]
    Inactive,
    #[error("this coupon has reached its usage limit")]
    UsageExhausted,
    #[error("a minimum order of {required} is required")]
    BelowMinimumOrder { required: Money },
    #[error("no items in the cart qualify for this promotion")]
    NoEligibleItems,
    #[error("promotion is misconfigured: {detail}")]
    Misconfigured { detail: String },
    #[error("{message}")]
    Declined { message: String },
    #[error("could not validate the promotion, please try again")]
    Unavailable,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub original_subtotal: Money,
    pub discount_amount: Money,
    pub discounted_subtotal: Money,
    pub shipping_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub discount_allocation: Vec<LineAllocation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRef {
    pub kind: String,
    pub reference: String,
}

impl From<&PromotionMechanism> for PromotionRef {
    fn from(m: &PromotionMechanism) -> Self { Self { kind: m.kind().to_string(), reference: m.reference().to_string() } }
}

/// Totals plus the status of the active promotion, for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub totals: OrderTotals,
    pub status: DiscountStatus,
    pub message: Option<String>,
    pub free_shipping: bool,
    pub promotion: Option<PromotionRef>,
}

fn check_window(window: ValidityWindow, now: DateTime<Utc>) -> Result<(), PromotionRejection> {
    if !window.has_started(now) { return Err(PromotionRejection::NotYetValid); }
    if window.has_ended(now) { return Err(PromotionRejection::Expired); }
    Ok(())
}

pub fn validate_coupon(coupon: &Coupon, cart: &Cart, now: DateTime<Utc>) -> Result<(), PromotionRejection> {
    coupon.reward().map_err(|e| PromotionRejection::Misconfigured { detail: e.to_string() })?;
    check_window(coupon.window(), now)?;
    if coupon.is_exhausted() { return Err(PromotionRejection::UsageExhausted); }
    if cart.is_empty() { return Err(PromotionRejection::NoEligibleItems); }
    if cart.subtotal() < coupon.min_order_amount {
        return Err(PromotionRejection::BelowMinimumOrder { required: coupon.min_order_amount });
    }
    Ok(())
}

pub fn validate_offer(offer: &Offer, cart: &Cart, now: DateTime<Utc>) -> Result<(), PromotionRejection> {
    if !offer.active { return Err(PromotionRejection::Inactive); }
    check_window(offer.window(), now)?;
    match &offer.rule {
        OfferRule::FlashSale { valid_from, valid_to, .. } => check_window(ValidityWindow::new(Some(*valid_from), Some(*valid_to)), now)?,
        OfferRule::BuyXGetY { buy_quantity, get_quantity } if *buy_quantity == 0 || *get_quantity == 0 => {
            return Err(PromotionRejection::Misconfigured { detail: "buy and get quantities must be positive".into() });
        }
        _ => {}
    }
    if eligibility::filter(cart.lines(), Some(&offer.scope)).is_empty() {
        return Err(PromotionRejection::NoEligibleItems);
    }
    Ok(())
}

/// Discount the mechanism earns against the cart as it is right now.
pub fn discount_for(cart: &Cart, mechanism: &PromotionMechanism, now: DateTime<Utc>) -> DiscountOutcome {
    let subtotal = cart.subtotal();
    match mechanism {
        PromotionMechanism::Coupon(coupon) => {
            let reward = match coupon.reward() {
                Ok(reward) => reward,
                Err(e) => return DiscountOutcome::inapplicable(DiscountStatus::NotEligible, e.to_string()),
            };
            if !coupon.window().contains(now) {
                return DiscountOutcome::inapplicable(DiscountStatus::OutsideWindow, "this coupon is not valid right now");
            }
            if subtotal < coupon.min_order_amount {
                let short = coupon.min_order_amount.saturating_sub(subtotal);
                return DiscountOutcome::inapplicable(DiscountStatus::BelowMinimum, format!("spend {short} more to use coupon {}", coupon.code));
            }
            calculators::reward_discount(&eligibility::filter(cart.lines(), None), &reward)
        }
        PromotionMechanism::Offer(offer) => {
            if !offer.active || !offer.window().contains(now) {
                return DiscountOutcome::inapplicable(DiscountStatus::OutsideWindow, "this offer is not running right now");
            }
            let eligible = eligibility::filter(cart.lines(), Some(&offer.scope));
            calculators::calculate(&offer.rule, &eligible, subtotal, now)
        }
    }
}

/// Prices a cart from scratch under `state`.
pub fn price(cart: &Cart, state: &PromotionState, tax: &TaxPolicy, shipping: &ShippingPolicy, now: DateTime<Utc>) -> PricingResult {
    let original_subtotal = cart.subtotal();
    let (outcome, promotion) = match state {
        PromotionState::NoPromotion => (DiscountOutcome::none(), None),
        PromotionState::PromotionActive(m) => (discount_for(cart, m, now), Some(PromotionRef::from(m))),
    };

    let discount_amount = outcome.amount.clamp_to(original_subtotal);
    let discounted_subtotal = original_subtotal.saturating_sub(discount_amount);
    let charges = tax_shipping::evaluate(discounted_subtotal, tax, shipping, outcome.free_shipping);

    tracing::debug!(
        subtotal = %original_subtotal, discount = %discount_amount, shipping = %charges.shipping_amount,
        tax = %charges.tax_amount, total = %charges.total_amount, status = ?outcome.status, "priced cart"
    );

    PricingResult {
        totals: OrderTotals {
            original_subtotal,
            discount_amount,
            discounted_subtotal,
            shipping_amount: charges.shipping_amount,
            tax_amount: charges.tax_amount,
            total_amount: charges.total_amount,
            discount_allocation: outcome.allocation,
        },
        status: outcome.status,
        message: outcome.message,
        free_shipping: outcome.free_shipping,
        promotion,
    }
}

/// The exclusivity rule lives here: applying any mechanism first drops the current one.
#[derive(Clone, Debug, Default)]
pub struct PromotionResolver {
    state: PromotionState,
}

impl PromotionResolver {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> &PromotionState { &self.state }

    pub fn active(&self) -> Option<&PromotionMechanism> {
        match &self.state { PromotionState::PromotionActive(m) => Some(m), PromotionState::NoPromotion => None }
    }

    /// Drops the active mechanism, then activates `mechanism` if it validates.
    /// On rejection the resolver is left in `NoPromotion`.
    pub fn apply(&mut self, mechanism: PromotionMechanism, cart: &Cart, now: DateTime<Utc>) -> Result<(), PromotionRejection> {
        if let PromotionState::PromotionActive(previous) = std::mem::take(&mut self.state) {
            tracing::debug!(kind = previous.kind(), reference = previous.reference(), "dropping active promotion");
        }
        match &mechanism {
            PromotionMechanism::Coupon(c) => validate_coupon(c, cart, now)?,
            PromotionMechanism::Offer(o) => validate_offer(o, cart, now)?,
        }
        self.state = PromotionState::PromotionActive(mechanism);
        Ok(())
    }

    pub fn remove(&mut self) -> Option<PromotionMechanism> {
        match std::mem::take(&mut self.state) {
            PromotionState::PromotionActive(m) => Some(m),
            PromotionState::NoPromotion => None,
        }
    }

    pub fn resolve(&self, cart: &Cart, tax: &TaxPolicy, shipping: &ShippingPolicy, now: DateTime<Utc>) -> PricingResult {
        price(cart, &self.state, tax, shipping, now)
    }
}
