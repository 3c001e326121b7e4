//! HTTP surface.
//!
//! Sessions live in memory. Collaborator calls never run under the session
//! lock: a coupon or offer apply takes a token, releases the lock, awaits the
//! collaborator and re-locks to commit.

pub mod dto;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;
use crate::checkout::{lookup_offer, ApplyOutcome, CheckoutSession};
use crate::domain::aggregates::{Cart, CartError, Order};
use crate::pricing::{ShippingPolicy, TaxPolicy};
use crate::services::{ServiceError, Services};
use crate::{PricingError, Result};
use dto::*;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, CheckoutSession>>>,
    pub services: Services,
    pub shipping: ShippingPolicy,
}

impl AppState {
    pub fn new(services: Services, shipping: ShippingPolicy) -> Self {
        Self { sessions: Arc::default(), services, shipping }
    }

    /// Tax settings are read when a cart is created; an unreachable settings
    /// service means no tax rather than a failed checkout.
    async fn tax_policy(&self) -> TaxPolicy {
        match self.services.tax.fetch().await.map(TaxPolicy::try_from) {
            Ok(Ok(policy)) => policy,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "invalid tax settings, charging no tax");
                TaxPolicy::disabled()
            }
            Err(e) => {
                tracing::warn!(error = %e, "tax settings unavailable, charging no tax");
                TaxPolicy::disabled()
            }
        }
    }

    /// Runs `f` under the write lock, then publishes whatever events it raised.
    async fn mutate<T>(&self, id: &str, f: impl FnOnce(&mut CheckoutSession) -> Result<T>) -> Result<T> {
        let (value, events) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(id).ok_or(PricingError::SessionNotFound)?;
            let value = f(session)?;
            (value, session.take_events())
        };
        self.services.publish_all(events).await;
        Ok(value)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-pricing"})) }))
        .route("/api/v1/quote", post(quote))
        .route("/api/v1/checkout/sessions", post(create_session))
        .route("/api/v1/checkout/sessions/:id", get(get_session))
        .route("/api/v1/checkout/sessions/:id/lines", post(add_line))
        .route("/api/v1/checkout/sessions/:id/lines/:line_id", put(update_line).delete(remove_line))
        .route("/api/v1/checkout/sessions/:id/coupon", post(apply_coupon))
        .route("/api/v1/checkout/sessions/:id/offer", post(apply_offer))
        .route("/api/v1/checkout/sessions/:id/promotion", axum::routing::delete(remove_promotion))
        .route("/api/v1/checkout/sessions/:id/submit", post(submit))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

fn validate(req: &impl Validate) -> Result<()> {
    req.validate().map_err(|e| PricingError::InvalidInput(e.to_string()))
}

async fn quote(State(s): State<AppState>, Json(r): Json<QuoteRequest>) -> Result<Json<QuoteResponse>> {
    validate(&r)?;
    let mut cart = Cart::new();
    for item in &r.items {
        validate(item)?;
        cart.add_line(item.to_line()?)?;
    }
    let mut session = CheckoutSession::new(cart, s.tax_policy().await, s.shipping);
    let rejection = match r.promotion {
        Some(mechanism) => match session.apply_local(mechanism) {
            ApplyOutcome::Rejected { rejection, .. } => Some(rejection),
            _ => None,
        },
        None => None,
    };
    Ok(Json(QuoteResponse { pricing: session.pricing().clone(), rejection }))
}

async fn create_session(State(s): State<AppState>, Json(r): Json<CreateSessionRequest>) -> Result<(StatusCode, Json<SessionView>)> {
    let mut cart = match r.customer_id.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(customer) => Cart::for_customer(customer),
        None => Cart::new(),
    };
    for item in &r.items {
        validate(item)?;
        cart.add_line(item.to_line()?)?;
    }
    let session = CheckoutSession::new(cart, s.tax_policy().await, s.shipping);
    let view = SessionView::from(&session);
    tracing::info!(session_id = %view.id, lines = view.lines.len(), "checkout session created");
    s.sessions.write().await.insert(view.id.clone(), session);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionView>> {
    let view = s.mutate(&id, |session| {
        session.refresh();
        Ok(SessionView::from(&*session))
    }).await?;
    Ok(Json(view))
}

async fn add_line(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<LineRequest>) -> Result<(StatusCode, Json<SessionView>)> {
    validate(&r)?;
    let line = r.to_line()?;
    let view = s.mutate(&id, |session| {
        session.add_line(line)?;
        Ok(SessionView::from(&*session))
    }).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_line(State(s): State<AppState>, Path((id, line_id)): Path<(String, String)>, Json(r): Json<UpdateLineRequest>) -> Result<Json<SessionView>> {
    let view = s.mutate(&id, |session| {
        session.update_quantity(&line_id, r.quantity)?;
        Ok(SessionView::from(&*session))
    }).await?;
    Ok(Json(view))
}

async fn remove_line(State(s): State<AppState>, Path((id, line_id)): Path<(String, String)>) -> Result<Json<SessionView>> {
    let view = s.mutate(&id, |session| {
        session.remove_line(&line_id)?;
        Ok(SessionView::from(&*session))
    }).await?;
    Ok(Json(view))
}

async fn apply_coupon(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ApplyCouponRequest>) -> Result<Json<ApplyResponse>> {
    validate(&r)?;
    let pending = s.mutate(&id, |session| Ok(session.begin_coupon(&r.code, r.user_id.clone()))).await?;
    let response = s.services.coupons.validate(&pending.request).await;
    let body = s.mutate(&id, |session| {
        let outcome = session.complete_coupon(pending, response);
        Ok(ApplyResponse { outcome, session: SessionView::from(&*session) })
    }).await?;
    Ok(Json(body))
}

async fn apply_offer(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<ApplyOfferRequest>) -> Result<Json<ApplyResponse>> {
    validate(&r)?;
    let pending = s.mutate(&id, |session| Ok(session.begin_offer(r.offer_id.trim()))).await?;
    let response = lookup_offer(s.services.offers.as_ref(), &pending).await;
    let body = s.mutate(&id, |session| {
        let outcome = session.complete_offer(pending, response);
        Ok(ApplyResponse { outcome, session: SessionView::from(&*session) })
    }).await?;
    Ok(Json(body))
}

async fn remove_promotion(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionView>> {
    let view = s.mutate(&id, |session| {
        session.remove_promotion();
        Ok(SessionView::from(&*session))
    }).await?;
    Ok(Json(view))
}

/// The session is taken out of the map for the duration of the submission and
/// put back if it fails, so it cannot be mutated or submitted twice meanwhile.
async fn submit(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<SubmitRequest>) -> Result<(StatusCode, Json<Order>)> {
    validate(&r)?;
    let mut session = s.sessions.write().await.remove(&id).ok_or(PricingError::SessionNotFound)?;
    let result = session.submit(r.customer_email.trim(), r.user_id.clone(), &s.services).await;
    let events = session.take_events();
    if result.is_err() {
        s.sessions.write().await.insert(id, session);
    }
    s.services.publish_all(events).await;
    let order = result?;
    tracing::info!(order_id = order.id(), "checkout completed");
    Ok((StatusCode::CREATED, Json(order)))
}

impl IntoResponse for PricingError {
    fn into_response(self) -> Response {
        let status = match &self {
            PricingError::SessionNotFound | PricingError::Cart(CartError::LineNotFound(_)) => StatusCode::NOT_FOUND,
            PricingError::Cart(_) | PricingError::Value(_) | PricingError::Order(_) | PricingError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PricingError::PromotionNoLongerValid(_) | PricingError::DiscountMismatch { .. } => StatusCode::CONFLICT,
            PricingError::Service(ServiceError::NotFound(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            PricingError::Service(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}
