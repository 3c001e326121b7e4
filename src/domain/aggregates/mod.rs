//! Aggregates module
pub mod cart;
pub mod order;
pub mod promotion;

pub use cart::{Cart, CartError, CartLine};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use promotion::{Audience, Coupon, DiscountKind, Offer, OfferRule, OfferScope, OfferType, PromotionMechanism, Reward, ValidityWindow};
