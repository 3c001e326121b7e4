//! Tax and shipping policy evaluation.
//!
//! Both are evaluated against the discounted subtotal, never the original one.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, Percentage};

/// Tax snapshot taken once per checkout session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxPolicy {
    pub enabled: bool,
    pub rate_percent: Percentage,
}

impl TaxPolicy {
    pub fn disabled() -> Self { Self::default() }
    pub fn rate(rate_percent: Percentage) -> Self { Self { enabled: true, rate_percent } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPolicy {
    pub free_threshold: Money,
    pub flat_fee: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self { Self { free_threshold: Money::from_major(999), flat_fee: Money::from_major(70) } }
}

/// Shipping, tax and grand total for one discounted subtotal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charges {
    pub shipping_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

pub fn tax_for(discounted_subtotal: Money, tax: &TaxPolicy) -> Money {
    if !tax.enabled { return Money::ZERO; }
    discounted_subtotal.percent(tax.rate_percent)
}

pub fn shipping_for(discounted_subtotal: Money, shipping: &ShippingPolicy, free_shipping_override: bool) -> Money {
    if free_shipping_override || discounted_subtotal >= shipping.free_threshold { Money::ZERO } else { shipping.flat_fee }
}

pub fn evaluate(discounted_subtotal: Money, tax: &TaxPolicy, shipping: &ShippingPolicy, free_shipping_override: bool) -> Charges {
    let shipping_amount = shipping_for(discounted_subtotal, shipping, free_shipping_override);
    let tax_amount = tax_for(discounted_subtotal, tax);
    let total_amount = discounted_subtotal + shipping_amount + tax_amount;
    Charges { shipping_amount, tax_amount, total_amount }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_free_shipping_at_threshold() {
        let c = evaluate(Money::from_major(999), &TaxPolicy::disabled(), &ShippingPolicy::default(), false);
        assert_eq!(c.shipping_amount, Money::ZERO);
        assert_eq!(c.total_amount, Money::from_major(999));
    }

    #[test]
    fn test_flat_fee_below_threshold() {
        let c = evaluate(Money::from_major(500), &TaxPolicy::disabled(), &ShippingPolicy::default(), false);
        assert_eq!(c.shipping_amount, Money::from_major(70));
        assert_eq!(c.total_amount, Money::from_major(570));
    }

    #[test]
    fn test_override_waives_fee() {
        let c = evaluate(Money::from_major(500), &TaxPolicy::disabled(), &ShippingPolicy::default(), true);
        assert_eq!(c.shipping_amount, Money::ZERO);
    }

    #[test]
    fn test_tax_on_given_subtotal() {
        let tax = TaxPolicy::rate(Percentage::new(dec!(18)).unwrap());
        let c = evaluate(Money::from_major(900), &tax, &ShippingPolicy::default(), false);
        assert_eq!(c.tax_amount, Money::from_major(162));
        assert_eq!(c.total_amount, Money::from_major(1132));
    }

    #[test]
    fn test_tax_rounds_to_minor_units() {
        let tax = TaxPolicy::rate(Percentage::new(dec!(3)).unwrap());
        assert_eq!(tax_for(Money::try_new(dec!(10.15)).unwrap(), &tax).amount(), dec!(0.30));
    }
}
