//! reqwest-backed collaborators.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use super::{
    CouponValidationRequest, CouponValidationResponse, CouponValidator, OfferCalculationRequest, OfferCalculationResponse,
    OfferService, OrderCreateRequest, OrderReceipt, OrderSink, ServiceError, TaxSettings, TaxSettingsSource,
};
use crate::domain::aggregates::Offer;

fn join(base: &str, path: &str) -> String { format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/')) }

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, ServiceError> {
    match resp.status() {
        s if s.is_success() => Ok(resp.json::<T>().await?),
        StatusCode::NOT_FOUND => Err(ServiceError::NotFound(what.to_string())),
        s => Err(ServiceError::Status(s.as_u16())),
    }
}

pub struct HttpCouponValidator { client: Client, base_url: String }

impl HttpCouponValidator {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self { Self { client, base_url: base_url.into() } }
}

#[async_trait]
impl CouponValidator for HttpCouponValidator {
    #[tracing::instrument(skip(self, request), fields(code = %request.code))]
    async fn validate(&self, request: &CouponValidationRequest) -> Result<CouponValidationResponse, ServiceError> {
        let resp = self.client.post(join(&self.base_url, "coupons/validate")).json(request).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(CouponValidationResponse { valid: false, coupon: None, message: Some("coupon not found".into()) }),
            // Rejections come back as 4xx with a regular body.
            s if s.is_client_error() => Ok(resp.json::<CouponValidationResponse>().await?),
            _ => decode(resp, "coupon").await,
        }
    }
}

pub struct HttpOfferService { client: Client, base_url: String }

impl HttpOfferService {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self { Self { client, base_url: base_url.into() } }
}

#[async_trait]
impl OfferService for HttpOfferService {
    #[tracing::instrument(skip(self))]
    async fn fetch_offer(&self, offer_id: &str) -> Result<Offer, ServiceError> {
        let resp = self.client.get(join(&self.base_url, &format!("offers/{offer_id}"))).send().await?;
        decode(resp, offer_id).await
    }

    #[tracing::instrument(skip(self, request), fields(offer_id = %request.offer_id))]
    async fn calculate(&self, request: &OfferCalculationRequest) -> Result<OfferCalculationResponse, ServiceError> {
        let resp = self.client.post(join(&self.base_url, "offers/calculate")).json(request).send().await?;
        decode(resp, &request.offer_id).await
    }
}

pub struct HttpTaxSettings { client: Client, url: String }

impl HttpTaxSettings {
    pub fn new(client: Client, url: impl Into<String>) -> Self { Self { client, url: url.into() } }
}

#[async_trait]
impl TaxSettingsSource for HttpTaxSettings {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self) -> Result<TaxSettings, ServiceError> {
        let resp = self.client.get(&self.url).send().await?;
        decode(resp, "tax settings").await
    }
}

pub struct HttpOrderSink { client: Client, base_url: String }

impl HttpOrderSink {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self { Self { client, base_url: base_url.into() } }
}

#[async_trait]
impl OrderSink for HttpOrderSink {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, total = %request.total_amount))]
    async fn create_order(&self, request: &OrderCreateRequest) -> Result<OrderReceipt, ServiceError> {
        let resp = self.client.post(join(&self.base_url, "orders")).json(request).send().await?;
        decode(resp, "order").await
    }
}
