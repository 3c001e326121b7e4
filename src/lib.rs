//! OpenSASE Pricing - Cart Pricing & Discount Resolution
//!
//! Checkout pricing for the storefront: one promotion per cart, recomputed
//! from scratch on every change.
//!
//! ## Features
//! - Coupon and offer discounts (percentage, fixed, buy X get Y, minimum
//!   purchase, flash sale, free shipping, referral)
//! - Post-discount tax and shipping
//! - Stale validation responses discarded by version token
//! - Order submission with server-side re-validation

use thiserror::Error;

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod pricing;
pub mod services;

use domain::aggregates::{CartError, OrderError};
use domain::value_objects::{Money, ValueError};
use services::ServiceError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Checkout session not found")]
    SessionNotFound,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Promotion is no longer valid: {0}")]
    PromotionNoLongerValid(String),

    #[error("Discount changed: expected {local}, server calculated {server}")]
    DiscountMismatch { local: Money, server: Money },

    #[error("Collaborator error: {0}")]
    Service(#[from] ServiceError),
}

pub type Result<T> = std::result::Result<T, PricingError>;
