//! Discount calculators, one per promotion type.
//!
//! Every calculator takes the eligible slice of the cart and returns a
//! [`DiscountOutcome`]. None of them fail: an inapplicable promotion yields a
//! zero discount with a [`DiscountStatus`] and a human-readable message, and
//! every amount is clamped to the value it discounts before it is returned.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::{CartLine, OfferRule, Reward, ValidityWindow};
use crate::domain::value_objects::{Money, Percentage, MINOR_UNITS};
use crate::pricing::eligibility::Eligibility;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountStatus {
    Applied,
    NotEligible,
    BelowMinimum,
    OutsideWindow,
    NoPromotion,
}

/// How much of the discount lands on one cart line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAllocation {
    pub line_id: String,
    pub product_id: String,
    pub discounted_quantity: u32,
    pub discount_per_unit: Money,
    pub line_discount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountOutcome {
    pub amount: Money,
    pub allocation: Vec<LineAllocation>,
    pub status: DiscountStatus,
    /// Set by free-shipping promotions; the subtotal discount stays zero.
    pub free_shipping: bool,
    pub message: Option<String>,
}

impl DiscountOutcome {
    pub fn none() -> Self {
        Self { amount: Money::ZERO, allocation: vec![], status: DiscountStatus::NoPromotion, free_shipping: false, message: None }
    }

    pub fn inapplicable(status: DiscountStatus, message: impl Into<String>) -> Self {
        Self { status, message: Some(message.into()), ..Self::none() }
    }

    fn applied(amount: Money, allocation: Vec<LineAllocation>) -> Self {
        Self { amount, allocation, status: DiscountStatus::Applied, free_shipping: false, message: None }
    }

    pub fn is_applied(&self) -> bool { self.status == DiscountStatus::Applied }
}

fn not_eligible() -> DiscountOutcome {
    DiscountOutcome::inapplicable(DiscountStatus::NotEligible, "no items in the cart qualify for this promotion")
}

pub fn percentage(eligible: &Eligibility<'_>, rate: Percentage, max_discount: Option<Money>) -> DiscountOutcome {
    if eligible.is_empty() || eligible.value.is_zero() { return not_eligible(); }
    let mut amount = eligible.value.percent(rate);
    if let Some(cap) = max_discount { amount = amount.clamp_to(cap); }
    let amount = amount.clamp_to(eligible.value);
    DiscountOutcome::applied(amount, allocate_pro_rata(eligible, amount))
}

/// Any part of `value` beyond the eligible value is forfeited.
pub fn fixed_amount(eligible: &Eligibility<'_>, value: Money) -> DiscountOutcome {
    if eligible.is_empty() || eligible.value.is_zero() { return not_eligible(); }
    let amount = value.clamp_to(eligible.value);
    DiscountOutcome::applied(amount, allocate_pro_rata(eligible, amount))
}

/// Every complete group of `buy + get` eligible units earns `get` free units,
/// taken from the lowest-priced units first. Equal prices keep cart order.
pub fn buy_x_get_y(eligible: &Eligibility<'_>, buy: u32, get: u32) -> DiscountOutcome {
    if buy == 0 || get == 0 {
        return DiscountOutcome::inapplicable(DiscountStatus::NotEligible, "offer is misconfigured: buy and get quantities must be positive");
    }
    let group = u64::from(buy) + u64::from(get);
    if eligible.quantity < group {
        let missing = group - eligible.quantity;
        return DiscountOutcome::inapplicable(DiscountStatus::NotEligible, format!("add {missing} more qualifying item(s) to unlock this offer"));
    }

    let mut free_units = (eligible.quantity / group).saturating_mul(u64::from(get));
    let mut by_price: Vec<&CartLine> = eligible.lines.clone();
    by_price.sort_by_key(|l| l.unit_price);

    let mut allocation = Vec::new();
    for line in by_price {
        if free_units == 0 { break; }
        let take = u32::try_from(free_units).map_or(line.quantity.value(), |free| free.min(line.quantity.value()));
        free_units -= u64::from(take);
        allocation.push(LineAllocation {
            line_id: line.line_id.clone(),
            product_id: line.product_id.clone(),
            discounted_quantity: take,
            discount_per_unit: line.unit_price,
            line_discount: line.unit_price.multiply(take),
        });
    }
    let amount = allocation.iter().map(|a| a.line_discount).sum::<Money>().clamp_to(eligible.value);
    DiscountOutcome::applied(amount, allocation)
}

/// Gated on the whole cart subtotal; the reward itself applies to the eligible lines.
pub fn minimum_purchase(eligible: &Eligibility<'_>, cart_subtotal: Money, threshold: Money, reward: &Reward) -> DiscountOutcome {
    if cart_subtotal < threshold {
        let short = threshold.saturating_sub(cart_subtotal);
        return DiscountOutcome::inapplicable(DiscountStatus::BelowMinimum, format!("spend {short} more to unlock this offer (minimum order {threshold})"));
    }
    reward_discount(eligible, reward)
}

pub fn flash_sale(eligible: &Eligibility<'_>, rate: Percentage, max_discount: Option<Money>, window: ValidityWindow, now: DateTime<Utc>) -> DiscountOutcome {
    if !window.contains(now) {
        return DiscountOutcome::inapplicable(DiscountStatus::OutsideWindow, "this flash sale is not running right now");
    }
    percentage(eligible, rate, max_discount)
}

pub fn free_shipping(eligible: &Eligibility<'_>) -> DiscountOutcome {
    if eligible.is_empty() { return not_eligible(); }
    DiscountOutcome { free_shipping: true, ..DiscountOutcome::applied(Money::ZERO, vec![]) }
}

pub fn referral(eligible: &Eligibility<'_>, reward: &Reward) -> DiscountOutcome { reward_discount(eligible, reward) }

pub fn reward_discount(eligible: &Eligibility<'_>, reward: &Reward) -> DiscountOutcome {
    match reward {
        Reward::Percentage { rate, max_discount } => percentage(eligible, *rate, *max_discount),
        Reward::Fixed { value } => fixed_amount(eligible, *value),
    }
}

/// Dispatches an offer rule to its calculator.
pub fn calculate(rule: &OfferRule, eligible: &Eligibility<'_>, cart_subtotal: Money, now: DateTime<Utc>) -> DiscountOutcome {
    match rule {
        OfferRule::Percentage { rate, max_discount } => percentage(eligible, *rate, *max_discount),
        OfferRule::FixedAmount { value } => fixed_amount(eligible, *value),
        OfferRule::BuyXGetY { buy_quantity, get_quantity } => buy_x_get_y(eligible, *buy_quantity, *get_quantity),
        OfferRule::MinimumPurchase { threshold, reward } => minimum_purchase(eligible, cart_subtotal, *threshold, reward),
        OfferRule::FlashSale { rate, max_discount, valid_from, valid_to } => {
            flash_sale(eligible, *rate, *max_discount, ValidityWindow::new(Some(*valid_from), Some(*valid_to)), now)
        }
        OfferRule::FreeShipping => free_shipping(eligible),
        OfferRule::Referral { reward, .. } => referral(eligible, reward),
    }
}

/// Spreads `amount` over the eligible lines by line value. Shares are rounded
/// down and the last line takes the residue, so the shares sum to `amount`.
fn allocate_pro_rata(eligible: &Eligibility<'_>, amount: Money) -> Vec<LineAllocation> {
    if amount.is_zero() || eligible.value.is_zero() { return vec![]; }
    let total = eligible.value.amount();
    let last = eligible.lines.len().saturating_sub(1);
    let mut remaining = amount.amount();

    eligible
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let share = if i == last {
                remaining
            } else {
                (amount.amount().saturating_mul(line.line_total().amount()) / total).round_dp_with_strategy(MINOR_UNITS, RoundingStrategy::ToZero)
            };
            remaining -= share;
            let qty = line.quantity.value();
            LineAllocation {
                line_id: line.line_id.clone(),
                product_id: line.product_id.clone(),
                discounted_quantity: qty,
                discount_per_unit: Money::from_decimal(share / Decimal::from(qty)),
                line_discount: Money::from_decimal(share),
            }
        })
        .filter(|a| !a.line_discount.is_zero())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OfferScope;
    use crate::domain::value_objects::Quantity;
    use crate::pricing::eligibility::filter;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn line(product: &str, category: &str, price: u64, qty: u32) -> CartLine {
        CartLine::new(product, category, Money::from_major(price), Quantity::new(qty).unwrap())
    }

    fn pct(rate: Decimal) -> Percentage { Percentage::new(rate).unwrap() }

    fn allocated(outcome: &DiscountOutcome) -> Money { outcome.allocation.iter().map(|a| a.line_discount).sum() }

    #[test]
    fn test_percentage_with_cap() {
        let lines = vec![line("R1", "rings", 1000, 1)];
        let e = filter(&lines, None);
        assert_eq!(percentage(&e, pct(dec!(10)), None).amount, Money::from_major(100));
        assert_eq!(percentage(&e, pct(dec!(10)), Some(Money::from_major(60))).amount, Money::from_major(60));
    }

    #[test]
    fn test_percentage_over_hundred_is_clamped() {
        let lines = vec![line("R1", "rings", 200, 1)];
        let e = filter(&lines, None);
        assert_eq!(percentage(&e, pct(dec!(150)), None).amount, Money::from_major(200));
    }

    #[test]
    fn test_fixed_amount_excess_is_forfeited() {
        let lines = vec![line("E1", "earrings", 100, 1), line("R1", "rings", 900, 1)];
        let e = filter(&lines, Some(&OfferScope::categories(["earrings"])));
        let outcome = fixed_amount(&e, Money::from_major(250));
        assert_eq!(outcome.amount, Money::from_major(100));
        assert_eq!(outcome.allocation.len(), 1);
        assert_eq!(outcome.allocation[0].product_id, "E1");
    }

    #[test]
    fn test_allocation_sums_exactly() {
        let lines = vec![line("A", "c", 10, 1), line("B", "c", 10, 1), line("C", "c", 10, 1)];
        let e = filter(&lines, None);
        let outcome = fixed_amount(&e, Money::from_major(10));
        assert_eq!(allocated(&outcome), Money::from_major(10));
        assert_eq!(outcome.allocation[0].line_discount.amount(), dec!(3.33));
        assert_eq!(outcome.allocation[2].line_discount.amount(), dec!(3.34));
    }

    #[test]
    fn test_allocation_per_unit() {
        let lines = vec![line("A", "c", 100, 4)];
        let e = filter(&lines, None);
        let outcome = percentage(&e, pct(dec!(25)), None);
        assert_eq!(outcome.allocation[0].discounted_quantity, 4);
        assert_eq!(outcome.allocation[0].discount_per_unit, Money::from_major(25));
    }

    #[test]
    fn test_buy_x_get_y_counts_quantities_beyond_u32() {
        let lines = vec![line("P1", "pins", 1, 3_000_000_000), line("P2", "pins", 1, 3_000_000_000)];
        let e = filter(&lines, None);
        assert_eq!(e.quantity, 6_000_000_000);
        let outcome = buy_x_get_y(&e, 1, 1);
        assert_eq!(outcome.status, DiscountStatus::Applied);
        assert_eq!(outcome.amount, Money::from_major(3_000_000_000));
        assert_eq!(outcome.allocation.len(), 1);
        assert_eq!(outcome.allocation[0].discounted_quantity, 3_000_000_000);
    }

    #[test]
    fn test_buy_two_get_one_cheapest_free() {
        let lines = vec![line("E3", "earrings", 200, 1), line("E1", "earrings", 100, 1), line("E2", "earrings", 150, 1)];
        let e = filter(&lines, Some(&OfferScope::categories(["earrings"])));
        let outcome = buy_x_get_y(&e, 2, 1);
        assert_eq!(outcome.amount, Money::from_major(100));
        assert_eq!(outcome.allocation.len(), 1);
        assert_eq!(outcome.allocation[0].product_id, "E1");
        assert_eq!(outcome.allocation[0].discounted_quantity, 1);
    }

    #[test]
    fn test_buy_x_get_y_multiple_groups_span_lines() {
        // 7 units, groups of 3 -> 2 free units, both from the cheapest line.
        let lines = vec![line("A", "c", 50, 5), line("B", "c", 20, 2)];
        let e = filter(&lines, None);
        let outcome = buy_x_get_y(&e, 2, 1);
        assert_eq!(outcome.amount, Money::from_major(40));
        assert_eq!(outcome.allocation[0].product_id, "B");
        assert_eq!(outcome.allocation[0].discounted_quantity, 2);
    }

    #[test]
    fn test_buy_x_get_y_free_units_overflow_to_next_cheapest() {
        let lines = vec![line("A", "c", 50, 5), line("B", "c", 20, 1)];
        let e = filter(&lines, None);
        let outcome = buy_x_get_y(&e, 1, 1);
        // 6 units -> 3 free: one at 20, two at 50.
        assert_eq!(outcome.amount, Money::from_major(120));
        assert_eq!(allocated(&outcome), outcome.amount);
    }

    #[test]
    fn test_buy_x_get_y_not_yet_eligible() {
        let lines = vec![line("E1", "earrings", 100, 2)];
        let e = filter(&lines, None);
        let outcome = buy_x_get_y(&e, 2, 1);
        assert_eq!(outcome.amount, Money::ZERO);
        assert_eq!(outcome.status, DiscountStatus::NotEligible);
        assert!(outcome.message.unwrap().contains("1 more"));
    }

    #[test]
    fn test_minimum_purchase_below_threshold() {
        let lines = vec![line("E1", "earrings", 300, 1)];
        let e = filter(&lines, None);
        let reward = Reward::Percentage { rate: pct(dec!(10)), max_discount: None };
        let outcome = minimum_purchase(&e, Money::from_major(300), Money::from_major(500), &reward);
        assert_eq!(outcome.amount, Money::ZERO);
        assert_eq!(outcome.status, DiscountStatus::BelowMinimum);
        let met = minimum_purchase(&e, Money::from_major(600), Money::from_major(500), &reward);
        assert_eq!(met.amount, Money::from_major(30));
    }

    #[test]
    fn test_flash_sale_window() {
        let lines = vec![line("N1", "necklaces", 400, 1)];
        let e = filter(&lines, None);
        let now = Utc::now();
        let open = ValidityWindow::new(Some(now - Duration::hours(1)), Some(now + Duration::hours(1)));
        let closed = ValidityWindow::new(Some(now - Duration::hours(2)), Some(now - Duration::hours(1)));
        assert_eq!(flash_sale(&e, pct(dec!(25)), None, open, now).amount, Money::from_major(100));
        let outside = flash_sale(&e, pct(dec!(25)), None, closed, now);
        assert_eq!(outside.status, DiscountStatus::OutsideWindow);
        assert_eq!(outside.amount, Money::ZERO);
    }

    #[test]
    fn test_free_shipping_has_no_subtotal_discount() {
        let lines = vec![line("N1", "necklaces", 400, 1)];
        let outcome = free_shipping(&filter(&lines, None));
        assert!(outcome.free_shipping);
        assert_eq!(outcome.amount, Money::ZERO);
        assert!(outcome.is_applied());
    }

    #[test]
    fn test_referral_uses_reward() {
        let lines = vec![line("N1", "necklaces", 400, 1)];
        let rule = OfferRule::Referral { referral_code: "FRIEND".into(), reward: Reward::Fixed { value: Money::from_major(50) } };
        let outcome = calculate(&rule, &filter(&lines, None), Money::from_major(400), Utc::now());
        assert_eq!(outcome.amount, Money::from_major(50));
    }

    #[test]
    fn test_empty_eligibility_is_not_an_error() {
        let lines: Vec<CartLine> = vec![];
        let outcome = percentage(&filter(&lines, None), pct(dec!(10)), None);
        assert_eq!(outcome.status, DiscountStatus::NotEligible);
        assert_eq!(outcome.amount, Money::ZERO);
    }
}
