//! Checkout sessions: a cart, its promotion state and the totals derived from them.

pub mod session;

pub use session::{lookup_offer, ApplyOutcome, CheckoutSession, PendingCoupon, PendingOffer};
