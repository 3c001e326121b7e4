//! Value Objects for checkout pricing
//!
//! Every monetary amount in the engine is a [`Money`]: a non-negative decimal
//! held at two minor-unit places. Intermediate arithmetic runs on raw
//! [`Decimal`] and is brought back into `Money` through [`Money::from_decimal`],
//! which rounds and clamps in one step.
//!
//! Amounts entering the engine are bounded by [`Money::MAX`]. Carts check
//! their running total against it with the `checked_*` operations; the plain
//! operators saturate.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use thiserror::Error;

/// Minor-unit precision of every stored amount.
pub const MINOR_UNITS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("amount must not be negative: {0}")]
    NegativeAmount(Decimal),
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("rate must not be negative: {0}")]
    NegativeRate(Decimal),
    #[error("amount exceeds the maximum of 1000000000000.00")]
    Overflow,
}

/// Rounds to minor units, half away from zero.
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MINOR_UNITS, RoundingStrategy::MidpointAwayFromZero)
}

pub fn clamp_non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// Money value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    /// Largest price, line total or cart subtotal the engine accepts (10^12).
    pub const MAX: Money = Money(Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0));

    /// Validating constructor for amounts that come from outside the engine.
    pub fn try_new(amount: Decimal) -> Result<Self, ValueError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValueError::NegativeAmount(amount));
        }
        Self::bounded(round(amount))
    }

    fn bounded(amount: Decimal) -> Result<Self, ValueError> {
        if amount > Money::MAX.0 { return Err(ValueError::Overflow); }
        Ok(Self(amount))
    }

    /// Constructor for computed amounts: rounds, then clamps at zero.
    pub fn from_decimal(amount: Decimal) -> Self {
        Self(clamp_non_negative(round(amount)))
    }

    pub fn from_major(units: u64) -> Self { Self(Decimal::from(units)) }

    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    /// Caps `self` at `ceiling`. Used for every discount against the amount it discounts.
    pub fn clamp_to(self, ceiling: Money) -> Money { self.min(ceiling) }

    pub fn saturating_sub(self, other: Money) -> Money { Money::from_decimal(self.0 - other.0) }

    pub fn multiply(&self, qty: u32) -> Money { Money(self.0.saturating_mul(Decimal::from(qty))) }

    pub fn checked_multiply(&self, qty: u32) -> Result<Money, ValueError> {
        self.0.checked_mul(Decimal::from(qty)).ok_or(ValueError::Overflow).and_then(Money::bounded)
    }

    pub fn checked_add(self, other: Money) -> Result<Money, ValueError> {
        self.0.checked_add(other.0).ok_or(ValueError::Overflow).and_then(Money::bounded)
    }

    pub fn percent(&self, rate: Percentage) -> Money { Money::from_decimal(rate.of(self.0)) }
}

impl TryFrom<Decimal> for Money {
    type Error = ValueError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Money::try_new(value) }
}

/// Always carries exactly two decimal places, so "100" goes out as "100.00".
impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        let mut amount = value.0;
        amount.rescale(MINOR_UNITS);
        amount
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0.saturating_add(rhs.0)) }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) { *self = *self + rhs; }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money { iter.copied().sum() }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Quantity value object, always at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, ValueError> {
        if value == 0 { return Err(ValueError::ZeroQuantity); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
}

impl TryFrom<u32> for Quantity {
    type Error = ValueError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Quantity::new(value) }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self { value.0 }
}

/// Non-negative percentage rate, e.g. `18` for 18%.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    pub fn new(rate: Decimal) -> Result<Self, ValueError> {
        if rate.is_sign_negative() && !rate.is_zero() { return Err(ValueError::NegativeRate(rate)); }
        Ok(Self(rate))
    }
    pub fn rate(&self) -> Decimal { self.0 }
    /// Unrounded share of `amount`.
    pub fn of(&self, amount: Decimal) -> Decimal { amount.saturating_mul(self.0) / Decimal::ONE_HUNDRED }
}

impl TryFrom<Decimal> for Percentage {
    type Error = ValueError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Percentage::new(value) }
}

impl From<Percentage> for Decimal {
    fn from(value: Percentage) -> Self { value.0 }
}
