//! Promotion definitions: coupons and special offers.
//!
//! A checkout session carries at most one [`PromotionMechanism`] at a time;
//! the exclusivity itself is enforced by the resolver, these are plain data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use crate::domain::value_objects::{Money, Percentage, ValueError};

/// Optional `[valid_from, valid_to]` window, both ends inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidityWindow {
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    pub fn new(valid_from: Option<DateTime<Utc>>, valid_to: Option<DateTime<Utc>>) -> Self { Self { valid_from, valid_to } }
    pub fn has_started(&self, now: DateTime<Utc>) -> bool { self.valid_from.map_or(true, |from| now >= from) }
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool { self.valid_to.map_or(false, |to| now > to) }
    pub fn contains(&self, now: DateTime<Utc>) -> bool { self.has_started(now) && !self.has_ended(now) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    #[serde(alias = "fixed_amount")]
    Fixed,
}

/// A simple percentage-or-fixed reward, embedded by coupons and by
/// minimum-purchase and referral offers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Reward {
    Percentage { rate: Percentage, max_discount: Option<Money> },
    Fixed { value: Money },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    #[default]
    All,
    NewCustomers,
    ReturningCustomers,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountKind,
    /// Rate for percentage coupons, amount for fixed ones.
    pub value: Decimal,
    #[serde(default)]
    pub min_order_amount: Money,
    pub max_discount: Option<Money>,
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub used_count: u32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub audience: Audience,
}

impl Coupon {
    pub fn percentage(code: impl Into<String>, rate: Decimal) -> Self { Self::with_kind(code, DiscountKind::Percentage, rate) }
    pub fn fixed(code: impl Into<String>, amount: Decimal) -> Self { Self::with_kind(code, DiscountKind::Fixed, amount) }

    fn with_kind(code: impl Into<String>, discount_type: DiscountKind, value: Decimal) -> Self {
        Self {
            code: code.into(), discount_type, value, min_order_amount: Money::ZERO, max_discount: None,
            usage_limit: None, used_count: 0, valid_from: None, valid_to: None, audience: Audience::All,
        }
    }

    pub fn window(&self) -> ValidityWindow { ValidityWindow::new(self.valid_from, self.valid_to) }

    pub fn is_exhausted(&self) -> bool { self.usage_limit.map_or(false, |limit| self.used_count >= limit) }

    pub fn reward(&self) -> Result<Reward, ValueError> {
        Ok(match self.discount_type {
            DiscountKind::Percentage => Reward::Percentage { rate: Percentage::new(self.value)?, max_discount: self.max_discount },
            DiscountKind::Fixed => Reward::Fixed { value: Money::try_new(self.value)? },
        })
    }
}

/// Product/category restriction. An absent or empty set does not restrict.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferScope {
    #[serde(default)]
    pub product_ids: Option<BTreeSet<String>>,
    #[serde(default)]
    pub category_ids: Option<BTreeSet<String>>,
}

impl OfferScope {
    pub fn products<I: IntoIterator<Item = S>, S: Into<String>>(ids: I) -> Self {
        Self { product_ids: Some(ids.into_iter().map(Into::into).collect()), category_ids: None }
    }
    pub fn categories<I: IntoIterator<Item = S>, S: Into<String>>(ids: I) -> Self {
        Self { product_ids: None, category_ids: Some(ids.into_iter().map(Into::into).collect()) }
    }
    pub fn is_unrestricted(&self) -> bool {
        self.product_ids.as_ref().map_or(true, BTreeSet::is_empty) && self.category_ids.as_ref().map_or(true, BTreeSet::is_empty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    Percentage,
    FixedAmount,
    BuyXGetY,
    MinimumPurchase,
    FlashSale,
    FreeShipping,
    Referral,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "offerType", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OfferRule {
    Percentage { rate: Percentage, max_discount: Option<Money> },
    FixedAmount { value: Money },
    BuyXGetY { buy_quantity: u32, get_quantity: u32 },
    MinimumPurchase { threshold: Money, reward: Reward },
    FlashSale { rate: Percentage, max_discount: Option<Money>, valid_from: DateTime<Utc>, valid_to: DateTime<Utc> },
    FreeShipping,
    /// The referral code is informational; the reward is an ordinary percentage or fixed rule.
    Referral { referral_code: String, reward: Reward },
}

impl OfferRule {
    pub fn offer_type(&self) -> OfferType {
        match self {
            Self::Percentage { .. } => OfferType::Percentage,
            Self::FixedAmount { .. } => OfferType::FixedAmount,
            Self::BuyXGetY { .. } => OfferType::BuyXGetY,
            Self::MinimumPurchase { .. } => OfferType::MinimumPurchase,
            Self::FlashSale { .. } => OfferType::FlashSale,
            Self::FreeShipping => OfferType::FreeShipping,
            Self::Referral { .. } => OfferType::Referral,
        }
    }
}

fn default_active() -> bool { true }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scope: OfferScope,
    pub rule: OfferRule,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Offer {
    pub fn new(id: impl Into<String>, rule: OfferRule) -> Self {
        Self { id: id.into(), name: String::new(), scope: OfferScope::default(), rule, valid_from: None, valid_to: None, active: true }
    }

    pub fn scoped(mut self, scope: OfferScope) -> Self { self.scope = scope; self }

    pub fn offer_type(&self) -> OfferType { self.rule.offer_type() }

    pub fn window(&self) -> ValidityWindow { ValidityWindow::new(self.valid_from, self.valid_to) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromotionMechanism {
    Coupon(Coupon),
    Offer(Offer),
}

impl PromotionMechanism {
    /// Coupon code or offer id.
    pub fn reference(&self) -> &str {
        match self { Self::Coupon(c) => &c.code, Self::Offer(o) => &o.id }
    }
    pub fn kind(&self) -> &'static str {
        match self { Self::Coupon(_) => "coupon", Self::Offer(_) => "offer" }
    }
    pub fn coupon_code(&self) -> Option<&str> {
        match self { Self::Coupon(c) => Some(&c.code), Self::Offer(_) => None }
    }
    pub fn offer_id(&self) -> Option<&str> {
        match self { Self::Offer(o) => Some(&o.id), Self::Coupon(_) => None }
    }
}
