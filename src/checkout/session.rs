//! Checkout session
//!
//! A session owns one cart, the promotion state machine and the tax/shipping
//! snapshot. Every mutation bumps `version` and reprices the cart from scratch;
//! nothing about a previous discount is carried forward.
//!
//! Applying a coupon or offer needs a collaborator round-trip, so it is split in
//! two halves. `begin_*` captures the current version as a token and builds the
//! request without touching state. `complete_*` commits only if no mutation
//! happened in between; otherwise the response is dropped as superseded.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, CartLine, Offer, Order, PromotionMechanism};
use crate::domain::events::{CheckoutEvent, DomainEvent};
use crate::pricing::{DiscountStatus, PricingResult, PromotionRejection, PromotionResolver, PromotionState, ShippingPolicy, TaxPolicy};
use crate::services::{
    CouponValidationRequest, CouponValidationResponse, CouponValidator, OfferCalculationRequest, OfferCalculationResponse,
    OfferService, ServiceError, Services,
};
use crate::{PricingError, Result};

/// Largest difference tolerated between the local and the server offer discount.
const DISCOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Clone, Debug)]
pub struct PendingCoupon {
    pub token: u64,
    pub request: CouponValidationRequest,
}

#[derive(Clone, Debug)]
pub struct PendingOffer {
    pub token: u64,
    pub offer_id: String,
    pub request: OfferCalculationRequest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied { pricing: PricingResult },
    Rejected { rejection: PromotionRejection, pricing: PricingResult },
    /// A newer mutation or request made this response stale; nothing changed.
    Superseded,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool { matches!(self, Self::Applied { .. }) }
}

/// Fetches the offer definition and the server's calculation for a pending offer.
pub async fn lookup_offer(offers: &dyn OfferService, pending: &PendingOffer) -> std::result::Result<(Offer, OfferCalculationResponse), ServiceError> {
    let offer = offers.fetch_offer(&pending.offer_id).await?;
    let calculation = offers.calculate(&pending.request).await?;
    Ok((offer, calculation))
}

#[derive(Clone, Debug)]
pub struct CheckoutSession {
    id: String,
    cart: Cart,
    resolver: PromotionResolver,
    tax: TaxPolicy,
    shipping: ShippingPolicy,
    version: u64,
    priced: PricingResult,
    events: Vec<DomainEvent>,
}

impl CheckoutSession {
    pub fn new(cart: Cart, tax: TaxPolicy, shipping: ShippingPolicy) -> Self {
        let resolver = PromotionResolver::new();
        let priced = resolver.resolve(&cart, &tax, &shipping, Utc::now());
        Self { id: Uuid::now_v7().to_string(), cart, resolver, tax, shipping, version: 0, priced, events: vec![] }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn version(&self) -> u64 { self.version }
    pub fn pricing(&self) -> &PricingResult { &self.priced }
    pub fn promotion(&self) -> &PromotionState { self.resolver.state() }
    pub fn tax_policy(&self) -> &TaxPolicy { &self.tax }

    fn recompute(&mut self) {
        self.priced = self.resolver.resolve(&self.cart, &self.tax, &self.shipping, Utc::now());
    }

    fn mutated(&mut self) -> &PricingResult {
        self.version += 1;
        self.recompute();
        &self.priced
    }

    /// Reprices without a state change, e.g. when a flash-sale window may have closed.
    pub fn refresh(&mut self) -> &PricingResult {
        self.recompute();
        &self.priced
    }

    pub fn add_line(&mut self, line: CartLine) -> Result<String> {
        let id = self.cart.add_line(line)?;
        self.mutated();
        Ok(id)
    }

    pub fn update_quantity(&mut self, line_id: &str, quantity: i64) -> Result<&PricingResult> {
        self.cart.update_quantity(line_id, quantity)?;
        Ok(self.mutated())
    }

    pub fn remove_line(&mut self, line_id: &str) -> Result<&PricingResult> {
        self.cart.remove_line(line_id)?;
        Ok(self.mutated())
    }

    pub fn set_tax_policy(&mut self, tax: TaxPolicy) -> &PricingResult {
        self.tax = tax;
        self.mutated()
    }

    pub fn remove_promotion(&mut self) -> &PricingResult {
        if let Some(previous) = self.resolver.remove() {
            tracing::info!(session_id = %self.id, kind = previous.kind(), reference = previous.reference(), "promotion removed");
            self.raise(CheckoutEvent::PromotionRemoved {
                session_id: self.id.clone(), kind: previous.kind().into(), reference: previous.reference().into(),
            });
        }
        self.mutated()
    }

    /// Activates an already-known mechanism without a collaborator round-trip.
    pub fn apply_local(&mut self, mechanism: PromotionMechanism) -> ApplyOutcome {
        self.version += 1;
        self.activate(mechanism)
    }

    pub fn begin_coupon(&mut self, code: &str, user_id: Option<String>) -> PendingCoupon {
        self.version += 1;
        PendingCoupon {
            token: self.version,
            request: CouponValidationRequest { code: code.trim().to_string(), order_amount: self.cart.subtotal(), user_id },
        }
    }

    pub fn complete_coupon(&mut self, pending: PendingCoupon, response: std::result::Result<CouponValidationResponse, ServiceError>) -> ApplyOutcome {
        if !self.is_current(pending.token) { return ApplyOutcome::Superseded; }
        let code = pending.request.code;
        match response {
            Err(e) => {
                tracing::warn!(session_id = %self.id, %code, error = %e, "coupon validation unavailable");
                self.reject("coupon", &code, PromotionRejection::Unavailable)
            }
            Ok(resp) if !resp.valid => {
                let message = resp.message.unwrap_or_else(|| "This coupon cannot be applied".into());
                self.reject("coupon", &code, PromotionRejection::Declined { message })
            }
            Ok(CouponValidationResponse { coupon: None, .. }) => {
                self.reject("coupon", &code, PromotionRejection::Misconfigured { detail: "validation returned no coupon".into() })
            }
            Ok(CouponValidationResponse { coupon: Some(payload), .. }) => self.activate(PromotionMechanism::Coupon(payload.into())),
        }
    }

    pub fn begin_offer(&mut self, offer_id: &str) -> PendingOffer {
        self.version += 1;
        PendingOffer { token: self.version, offer_id: offer_id.to_string(), request: OfferCalculationRequest::for_cart(offer_id, &self.cart) }
    }

    pub fn complete_offer(&mut self, pending: PendingOffer, response: std::result::Result<(Offer, OfferCalculationResponse), ServiceError>) -> ApplyOutcome {
        if !self.is_current(pending.token) { return ApplyOutcome::Superseded; }
        match response {
            Err(ServiceError::NotFound(_)) => {
                self.reject("offer", &pending.offer_id, PromotionRejection::Declined { message: "Offer not found".into() })
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id, offer_id = %pending.offer_id, error = %e, "offer lookup unavailable");
                self.reject("offer", &pending.offer_id, PromotionRejection::Unavailable)
            }
            Ok((_, calculation)) if !calculation.success => {
                let message = calculation.message.unwrap_or_else(|| "This offer cannot be applied".into());
                self.reject("offer", &pending.offer_id, PromotionRejection::Declined { message })
            }
            Ok((offer, _)) => self.activate(PromotionMechanism::Offer(offer)),
        }
    }

    pub async fn apply_coupon(&mut self, code: &str, user_id: Option<String>, coupons: &dyn CouponValidator) -> ApplyOutcome {
        let pending = self.begin_coupon(code, user_id);
        let response = coupons.validate(&pending.request).await;
        self.complete_coupon(pending, response)
    }

    pub async fn apply_offer(&mut self, offer_id: &str, offers: &dyn OfferService) -> ApplyOutcome {
        let pending = self.begin_offer(offer_id);
        let response = lookup_offer(offers, &pending).await;
        self.complete_offer(pending, response)
    }

    /// Re-validates the active promotion with its collaborator, then hands the
    /// order to the order service. The promotion is only referenced on the order
    /// if it actually produced a discount (or free shipping).
    pub async fn submit(&mut self, customer_email: &str, user_id: Option<String>, services: &Services) -> Result<Order> {
        self.refresh();
        let promotion = self.resolver.active().filter(|_| self.priced.status == DiscountStatus::Applied).cloned();

        match &promotion {
            Some(PromotionMechanism::Coupon(coupon)) => {
                let request = CouponValidationRequest { code: coupon.code.clone(), order_amount: self.cart.subtotal(), user_id: user_id.clone() };
                let response = services.coupons.validate(&request).await?;
                if !response.valid {
                    return Err(PricingError::PromotionNoLongerValid(response.message.unwrap_or_else(|| coupon.code.clone())));
                }
            }
            Some(PromotionMechanism::Offer(offer)) => {
                let response = services.offers.calculate(&OfferCalculationRequest::for_cart(offer.id.clone(), &self.cart)).await?;
                if !response.success {
                    return Err(PricingError::PromotionNoLongerValid(response.message.unwrap_or_else(|| offer.id.clone())));
                }
                let local = self.priced.totals.discount_amount;
                let gap = local.max(response.discount).saturating_sub(local.min(response.discount));
                if gap.amount() > DISCOUNT_TOLERANCE {
                    return Err(PricingError::DiscountMismatch { local, server: response.discount });
                }
            }
            None => {}
        }

        let mut order = Order::from_checkout(self.id.clone(), customer_email, user_id, &self.cart, &self.priced, promotion.as_ref())?;
        order.submit()?;
        let receipt = services.orders.create_order(&order.to_create_request()).await?;
        order.accept(receipt.order_number)?;
        tracing::info!(session_id = %self.id, order_id = order.id(), total = %order.totals().total_amount, "order submitted");
        self.events.extend(order.take_events());
        Ok(order)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn is_current(&mut self, token: u64) -> bool {
        if token == self.version { return true; }
        tracing::debug!(session_id = %self.id, token, current = self.version, "discarding stale promotion response");
        self.raise(CheckoutEvent::StaleResponseDiscarded { session_id: self.id.clone(), token, current: self.version });
        false
    }

    fn activate(&mut self, mechanism: PromotionMechanism) -> ApplyOutcome {
        let (kind, reference) = (mechanism.kind(), mechanism.reference().to_string());
        match self.resolver.apply(mechanism, &self.cart, Utc::now()) {
            Ok(()) => {
                let pricing = self.mutated().clone();
                tracing::info!(session_id = %self.id, kind, %reference, discount = %pricing.totals.discount_amount, "promotion applied");
                self.raise(CheckoutEvent::PromotionApplied {
                    session_id: self.id.clone(), kind: kind.into(), reference, discount: pricing.totals.discount_amount,
                });
                ApplyOutcome::Applied { pricing }
            }
            Err(rejection) => self.reject(kind, &reference, rejection),
        }
    }

    /// A failed apply leaves the session without any promotion.
    fn reject(&mut self, kind: &str, reference: &str, rejection: PromotionRejection) -> ApplyOutcome {
        self.resolver.remove();
        tracing::info!(session_id = %self.id, kind, reference, reason = %rejection, "promotion rejected");
        self.raise(CheckoutEvent::PromotionRejected {
            session_id: self.id.clone(), kind: kind.into(), reference: reference.into(), reason: rejection.to_string(),
        });
        let pricing = self.mutated().clone();
        ApplyOutcome::Rejected { rejection, pricing }
    }

    fn raise(&mut self, event: CheckoutEvent) { self.events.push(DomainEvent::Checkout(event)); }
}
