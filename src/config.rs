//! Environment configuration.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;
use crate::domain::checkout::PricingPolicy;
use crate::domain::value_objects::Money;

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub admin_token: String,
    pub currency: String,
    pub payment: PaymentConfig,
    pub pricing: PricingPolicy,
}

#[derive(Clone, Default)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| get(key).filter(|v| !v.trim().is_empty()).ok_or(ConfigError::Missing(key));
        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            shipping_fee: Money::new(parse_or(&get, "SHIPPING_FEE", defaults.shipping_fee.amount())?),
            free_shipping_min: Money::new(parse_or(&get, "FREE_SHIPPING_MIN", defaults.free_shipping_min.amount())?),
            tax_rate: parse_or(&get, "TAX_RATE", defaults.tax_rate)?,
            cod_max_amount: Money::new(parse_or(&get, "COD_MAX_AMOUNT", defaults.cod_max_amount.amount())?),
            max_quantity_per_item: parse_or(&get, "MAX_QUANTITY_PER_ITEM", defaults.max_quantity_per_item)?,
            return_window_days: parse_or(&get, "RETURN_WINDOW_DAYS", defaults.return_window_days)?,
        };
        if pricing.tax_rate < Decimal::ZERO || pricing.max_quantity_per_item == 0 {
            return Err(ConfigError::Invalid { key: "TAX_RATE/MAX_QUANTITY_PER_ITEM", value: "out of range".into() });
        }
        Ok(Self {
            port: parse_or(&get, "PORT", 8083)?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            nats_url: get("NATS_URL").filter(|v| !v.is_empty()),
            admin_token: required("ADMIN_TOKEN")?,
            currency: get("CURRENCY").unwrap_or_else(|| "INR".to_string()),
            payment: PaymentConfig {
                key_id: get("PAYMENT_KEY_ID").unwrap_or_default(),
                key_secret: get("PAYMENT_KEY_SECRET").unwrap_or_default(),
                webhook_secret: get("PAYMENT_WEBHOOK_SECRET").unwrap_or_default(),
            },
            pricing,
        })
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/shop"), ("ADMIN_TOKEN", "secret")])).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.currency, "INR");
        assert_eq!(cfg.pricing.shipping_fee, Money::from_major(50));
        assert_eq!(cfg.pricing.return_window_days, 7);
        assert!(cfg.nats_url.is_none());
    }

    #[test]
    fn test_missing_and_invalid_values() {
        assert!(matches!(AppConfig::from_lookup(lookup(&[("ADMIN_TOKEN", "x")])), Err(ConfigError::Missing("DATABASE_URL"))));
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("ADMIN_TOKEN", "x"), ("PORT", "eighty")]));
        assert!(matches!(err, Err(ConfigError::Invalid { key: "PORT", .. })));
    }

    #[test]
    fn test_pricing_overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"), ("ADMIN_TOKEN", "x"), ("SHIPPING_FEE", "79.50"), ("COD_MAX_AMOUNT", "2500"),
        ])).unwrap();
        assert_eq!(cfg.pricing.shipping_fee, Money::new(Decimal::new(7950, 2)));
        assert_eq!(cfg.pricing.cod_max_amount, Money::from_major(2500));
    }
}
