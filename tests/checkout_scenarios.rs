//! End-to-end pricing scenarios against the public checkout API.

use chrono::{Duration, Utc};
use opensase_pricing::checkout::{ApplyOutcome, CheckoutSession};
use opensase_pricing::domain::aggregates::{Cart, CartLine, Coupon, Offer, OfferRule, OfferScope, PromotionMechanism, Reward};
use opensase_pricing::domain::value_objects::{Money, Percentage, Quantity};
use opensase_pricing::pricing::{self, DiscountStatus, PromotionRejection, PromotionState, ShippingPolicy, TaxPolicy};
use opensase_pricing::services::memory::{InMemoryCoupons, InMemoryOffers};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn line(product: &str, category: &str, price: Decimal, qty: u32) -> CartLine {
    CartLine::new(product, category, Money::try_new(price).unwrap(), Quantity::new(qty).unwrap())
}

fn session(lines: Vec<CartLine>, tax: TaxPolicy) -> CheckoutSession {
    CheckoutSession::new(Cart::from_lines(lines), tax, ShippingPolicy::default())
}

fn gst() -> TaxPolicy { TaxPolicy::rate(Percentage::new(dec!(18)).unwrap()) }

fn money(d: Decimal) -> Money { Money::try_new(d).unwrap() }

#[test]
fn scenario_a_free_shipping_above_threshold() {
    let s = session(vec![line("N1", "necklaces", dec!(1200), 1)], TaxPolicy::disabled());
    let totals = &s.pricing().totals;
    assert_eq!(totals.shipping_amount, Money::ZERO);
    assert_eq!(totals.total_amount, money(dec!(1200)));
    assert_eq!(s.pricing().status, DiscountStatus::NoPromotion);
}

#[test]
fn scenario_b_flat_fee_below_threshold() {
    let s = session(vec![line("R1", "rings", dec!(500), 1)], TaxPolicy::disabled());
    assert_eq!(s.pricing().totals.shipping_amount, money(dec!(70)));
    assert_eq!(s.pricing().totals.total_amount, money(dec!(570)));
}

#[test]
fn scenario_c_tax_and_shipping_follow_the_discount() {
    let mut s = session(vec![line("R1", "rings", dec!(1000), 1)], gst());
    assert!(s.apply_local(PromotionMechanism::Coupon(Coupon::percentage("SAVE10", dec!(10)))).is_applied());
    let totals = &s.pricing().totals;
    assert_eq!(totals.discount_amount, money(dec!(100)));
    assert_eq!(totals.discounted_subtotal, money(dec!(900)));
    assert_eq!(totals.shipping_amount, money(dec!(70)));
    assert_eq!(totals.tax_amount, money(dec!(162)));
    assert_eq!(totals.total_amount, money(dec!(1132)));
}

#[tokio::test]
async fn scenario_d_buy_two_get_one_on_earrings() {
    let offer = Offer::new("bogo", OfferRule::BuyXGetY { buy_quantity: 2, get_quantity: 1 }).scoped(OfferScope::categories(["earrings"]));
    let offers = InMemoryOffers::default().with_offer(offer);
    let mut s = session(vec![
        line("E1", "earrings", dec!(100), 1),
        line("E2", "earrings", dec!(150), 1),
        line("E3", "earrings", dec!(200), 1),
        line("R1", "rings", dec!(50), 1),
    ], TaxPolicy::disabled());

    assert!(s.apply_offer("bogo", &offers).await.is_applied());
    let totals = &s.pricing().totals;
    assert_eq!(totals.discount_amount, money(dec!(100)));
    assert_eq!(totals.discount_allocation.len(), 1);
    assert_eq!(totals.discount_allocation[0].product_id, "E1");
}

#[test]
fn scenario_e_minimum_purchase_not_reached() {
    let rule = OfferRule::MinimumPurchase { threshold: money(dec!(500)), reward: Reward::Fixed { value: money(dec!(50)) } };
    let mut s = session(vec![line("P1", "pendants", dec!(300), 1)], TaxPolicy::disabled());
    s.apply_local(PromotionMechanism::Offer(Offer::new("min500", rule)));
    assert_eq!(s.pricing().totals.discount_amount, Money::ZERO);
    assert_eq!(s.pricing().status, DiscountStatus::BelowMinimum);

    // Crossing the threshold later activates the reward without re-applying.
    s.add_line(line("P2", "pendants", dec!(250), 1)).unwrap();
    assert_eq!(s.pricing().status, DiscountStatus::Applied);
    assert_eq!(s.pricing().totals.discount_amount, money(dec!(50)));
}

#[test]
fn pricing_is_idempotent() {
    let cart = Cart::from_lines(vec![line("R1", "rings", dec!(333.33), 3), line("E1", "earrings", dec!(99.99), 2)]);
    let state = PromotionState::PromotionActive(PromotionMechanism::Coupon(Coupon::percentage("SAVE15", dec!(15))));
    let now = Utc::now();
    let first = pricing::price(&cart, &state, &gst(), &ShippingPolicy::default(), now);
    let second = pricing::price(&cart, &state, &gst(), &ShippingPolicy::default(), now);
    assert_eq!(first, second);
}

#[test]
fn discount_never_exceeds_subtotal() {
    let mut s = session(vec![line("R1", "rings", dec!(40), 1)], gst());
    s.apply_local(PromotionMechanism::Coupon(Coupon::fixed("BIG", dec!(500))));
    let totals = &s.pricing().totals;
    assert_eq!(totals.discount_amount, money(dec!(40)));
    assert_eq!(totals.discounted_subtotal, Money::ZERO);
    assert_eq!(totals.tax_amount, Money::ZERO);
    assert_eq!(totals.total_amount, money(dec!(70)));
}

#[test]
fn percentage_ceiling_caps_discount() {
    let mut coupon = Coupon::percentage("HALF", dec!(50));
    coupon.max_discount = Some(money(dec!(200)));
    let mut s = session(vec![line("N1", "necklaces", dec!(2000), 1)], TaxPolicy::disabled());
    s.apply_local(PromotionMechanism::Coupon(coupon));
    assert_eq!(s.pricing().totals.discount_amount, money(dec!(200)));
}

#[test]
fn only_one_promotion_is_ever_active() {
    let mut s = session(vec![line("R1", "rings", dec!(1000), 1)], TaxPolicy::disabled());
    s.apply_local(PromotionMechanism::Coupon(Coupon::percentage("SAVE10", dec!(10))));
    let offer = Offer::new("flat", OfferRule::FixedAmount { value: money(dec!(25)) });
    s.apply_local(PromotionMechanism::Offer(offer));
    assert!(matches!(s.promotion(), PromotionState::PromotionActive(PromotionMechanism::Offer(o)) if o.id == "flat"));
    assert_eq!(s.pricing().totals.discount_amount, money(dec!(25)));
}

#[test]
fn expired_flash_sale_is_rejected() {
    let now = Utc::now();
    let rule = OfferRule::FlashSale {
        rate: Percentage::new(dec!(30)).unwrap(), max_discount: None,
        valid_from: now - Duration::hours(3), valid_to: now - Duration::hours(1),
    };
    let mut s = session(vec![line("R1", "rings", dec!(1000), 1)], TaxPolicy::disabled());
    let outcome = s.apply_local(PromotionMechanism::Offer(Offer::new("flash", rule)));
    assert!(matches!(outcome, ApplyOutcome::Rejected { rejection: PromotionRejection::Expired, .. }));
    assert_eq!(s.promotion(), &PromotionState::NoPromotion);
}

#[test]
fn free_shipping_offer_waives_the_fee() {
    let mut s = session(vec![line("R1", "rings", dec!(200), 1)], TaxPolicy::disabled());
    s.apply_local(PromotionMechanism::Offer(Offer::new("ship", OfferRule::FreeShipping)));
    let totals = &s.pricing().totals;
    assert_eq!(totals.discount_amount, Money::ZERO);
    assert_eq!(totals.shipping_amount, Money::ZERO);
    assert_eq!(totals.total_amount, money(dec!(200)));
}

#[tokio::test]
async fn stale_coupon_response_never_overwrites_newer_state() {
    let coupons = InMemoryCoupons::default().with_coupon(Coupon::percentage("SAVE10", dec!(10)));
    let mut s = session(vec![line("R1", "rings", dec!(1000), 1)], TaxPolicy::disabled());

    let pending = s.begin_coupon("SAVE10", None);
    let response = opensase_pricing::services::CouponValidator::validate(&coupons, &pending.request).await;
    let id = s.cart().lines()[0].line_id.clone();
    s.update_quantity(&id, 2).unwrap();

    assert_eq!(s.complete_coupon(pending, response), ApplyOutcome::Superseded);
    assert_eq!(s.pricing().totals.discount_amount, Money::ZERO);
    assert_eq!(s.pricing().totals.original_subtotal, money(dec!(2000)));
}
