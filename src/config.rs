//! Environment configuration.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use crate::domain::value_objects::Money;
use crate::pricing::ShippingPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub shipping: ShippingPolicy,
    pub coupon_service_url: Option<String>,
    pub offer_service_url: Option<String>,
    pub tax_settings_url: Option<String>,
    pub order_service_url: Option<String>,
    pub nats_url: Option<String>,
    pub service_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> { Self::from_lookup(|key| std::env::var(key).ok()) }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let money = |key: &str, default: Money| -> Result<Money> {
            match get(key) {
                Some(raw) => {
                    let value = Decimal::from_str(&raw).with_context(|| format!("{key} is not a decimal: {raw}"))?;
                    Money::try_new(value).with_context(|| format!("{key} must not be negative"))
                }
                None => Ok(default),
            }
        };
        let defaults = ShippingPolicy::default();

        Ok(Self {
            port: get("PORT").map(|p| p.parse::<u16>()).transpose().context("PORT is not a port number")?.unwrap_or(8084),
            shipping: ShippingPolicy {
                free_threshold: money("FREE_SHIPPING_THRESHOLD", defaults.free_threshold)?,
                flat_fee: money("FLAT_SHIPPING_FEE", defaults.flat_fee)?,
            },
            coupon_service_url: get("COUPON_SERVICE_URL"),
            offer_service_url: get("OFFER_SERVICE_URL"),
            tax_settings_url: get("TAX_SETTINGS_URL"),
            order_service_url: get("ORDER_SERVICE_URL"),
            nats_url: get("NATS_URL"),
            service_timeout: Duration::from_secs(
                get("SERVICE_TIMEOUT_SECS").map(|s| s.parse::<u64>()).transpose().context("SERVICE_TIMEOUT_SECS is not a number")?.unwrap_or(5),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8084);
        assert_eq!(c.shipping, ShippingPolicy::default());
        assert_eq!(c.service_timeout, Duration::from_secs(5));
        assert!(c.coupon_service_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[("PORT", "9000"), ("FLAT_SHIPPING_FEE", "49.5"), ("COUPON_SERVICE_URL", "http://coupons"), ("NATS_URL", "  ")]).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.shipping.flat_fee.to_string(), "49.50");
        assert_eq!(c.coupon_service_url.as_deref(), Some("http://coupons"));
        assert!(c.nats_url.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(config(&[("FREE_SHIPPING_THRESHOLD", "-1")]).is_err());
        assert!(config(&[("PORT", "http")]).is_err());
    }
}
