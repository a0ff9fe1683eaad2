//! Order service configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::Serialize;
use std::env;

use tatylu_core::money::Money;
use tatylu_core::normalize::RequestDefaults;
use tatylu_core::pricing::ShippingPolicy;
use tatylu_core::validation::validate_tax_rate;
use tatylu_core::{TaxRate, DEFAULT_CURRENCY};

/// Order service configuration.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfig {
    /// SQLite database file
    pub database_path: String,

    /// Tax rate applied when a request carries none
    pub default_tax_rate: TaxRate,

    /// Currency code applied when a request carries none
    pub default_currency: String,

    /// Computed shipping fee parameters
    pub shipping: ShippingPolicy,

    /// Storefront base URL, used in invoice email links
    pub app_base_url: String,

    /// Sender address for notification emails
    pub email_from: String,

    /// Pending notifications before new ones are dropped
    pub notification_queue_capacity: usize,
}

impl Default for OrderConfig {
    fn default() -> Self {
        OrderConfig {
            database_path: "./tatylu.db".to_string(),
            default_tax_rate: TaxRate::default(),
            default_currency: DEFAULT_CURRENCY.to_string(),
            shipping: ShippingPolicy::default(),
            app_base_url: "http://localhost:4000".to_string(),
            email_from: "no-reply@localhost".to_string(),
            notification_queue_capacity: 64,
        }
    }
}

impl OrderConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup.
    pub fn load_from(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = OrderConfig::default();
        let text = |key: &str, default: String| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let default_tax_rate = match var("DEFAULT_TAX_RATE") {
            Some(raw) => {
                let fraction = parse_number("DEFAULT_TAX_RATE", &raw)?;
                validate_tax_rate(fraction)
                    .map_err(|_| ConfigError::InvalidValue("DEFAULT_TAX_RATE".to_string()))?
            }
            None => defaults.default_tax_rate,
        };

        let shipping = ShippingPolicy {
            base: money_var(&var, "BASE_SHIPPING_FEE", defaults.shipping.base)?,
            per_item: money_var(&var, "PER_ITEM_SHIPPING_FEE", defaults.shipping.per_item)?,
            max: money_var(&var, "MAX_SHIPPING_FEE", defaults.shipping.max)?,
        };

        let notification_queue_capacity = match var("NOTIFICATION_QUEUE_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidValue("NOTIFICATION_QUEUE_CAPACITY".to_string()))?,
            None => defaults.notification_queue_capacity,
        };

        let config = OrderConfig {
            database_path: text("DATABASE_PATH", defaults.database_path),
            default_tax_rate,
            default_currency: text("DEFAULT_CURRENCY", defaults.default_currency).to_uppercase(),
            shipping,
            app_base_url: text("APP_BASE_URL", defaults.app_base_url)
                .trim_end_matches('/')
                .to_string(),
            email_from: text("EMAIL_FROM", defaults.email_from),
            notification_queue_capacity,
        };

        Ok(config)
    }

    /// Defaults handed to request normalization.
    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            tax_rate: self.default_tax_rate,
            currency: self.default_currency.clone(),
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string()))
}

/// A non-negative dollar amount.
fn money_var(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Money,
) -> Result<Money, ConfigError> {
    match var(key) {
        Some(raw) => {
            let amount = parse_number(key, &raw)?;
            if amount < 0.0 {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
            Ok(Money::from_amount(amount))
        }
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<OrderConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OrderConfig::load_from(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_path, "./tatylu.db");
        assert_eq!(config.default_tax_rate.bps(), 1500);
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.shipping, ShippingPolicy::default());
        assert_eq!(config.app_base_url, "http://localhost:4000");
        assert_eq!(config.notification_queue_capacity, 64);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DEFAULT_TAX_RATE", "0.12"),
            ("DEFAULT_CURRENCY", "eur"),
            ("BASE_SHIPPING_FEE", "5"),
            ("MAX_SHIPPING_FEE", "7.25"),
            ("APP_BASE_URL", "https://tatylu.com/"),
        ])
        .unwrap();

        assert_eq!(config.default_tax_rate.bps(), 1200);
        assert_eq!(config.default_currency, "EUR");
        assert_eq!(config.shipping.base.cents(), 500);
        assert_eq!(config.shipping.per_item.cents(), 50);
        assert_eq!(config.shipping.max.cents(), 725);
        assert_eq!(config.app_base_url, "https://tatylu.com");
        assert_eq!(config.request_defaults().currency, "EUR");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("DEFAULT_TAX_RATE", "abc")]),
            Err(ConfigError::InvalidValue(k)) if k == "DEFAULT_TAX_RATE"
        ));
        assert!(load(&[("DEFAULT_TAX_RATE", "1.5")]).is_err());
        assert!(load(&[("BASE_SHIPPING_FEE", "-1")]).is_err());
        assert!(load(&[("NOTIFICATION_QUEUE_CAPACITY", "0")]).is_err());
    }
}
