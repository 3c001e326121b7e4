//! Cart pricing and discount resolution.
//!
//! Pipeline: eligibility filter → discount calculator → tax & shipping.
//! Everything here is a pure function of its inputs.

pub mod calculators;
pub mod eligibility;
pub mod resolver;
pub mod tax_shipping;

pub use calculators::{DiscountOutcome, DiscountStatus, LineAllocation};
pub use eligibility::Eligibility;
pub use resolver::{price, OrderTotals, PricingResult, PromotionRef, PromotionRejection, PromotionResolver, PromotionState};
pub use tax_shipping::{Charges, ShippingPolicy, TaxPolicy};
