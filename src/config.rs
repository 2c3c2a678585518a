use crate::domain::session::PaymentPurpose;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::path::Path;

/// Who started the payment; decides where the gateway sends the browser back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payer {
    Customer,
    DealerStaff,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReturnUrls {
    pub customer_deposit: String,
    pub customer_final_balance: String,
    pub staff_deposit: String,
    pub staff_final_balance: String,
}

impl ReturnUrls {
    pub fn select(&self, payer: Payer, purpose: PaymentPurpose) -> &str {
        match (payer, purpose) {
            (Payer::Customer, PaymentPurpose::Deposit) => &self.customer_deposit,
            (Payer::Customer, PaymentPurpose::FinalBalance) => &self.customer_final_balance,
            (Payer::DealerStaff, PaymentPurpose::Deposit) => &self.staff_deposit,
            (Payer::DealerStaff, PaymentPurpose::FinalBalance) => &self.staff_final_balance,
        }
    }
}

/// Gateway settings, handed explicitly to the components that need them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayConfig {
    pub merchant_code: String,
    pub secret: String,
    pub base_url: String,
    #[serde(default = "defaults::version")]
    pub version: String,
    #[serde(default = "defaults::currency")]
    pub currency: String,
    #[serde(default = "defaults::locale")]
    pub locale: String,
    #[serde(default = "defaults::order_type")]
    pub order_type: String,
    /// Factor from minor currency units to the gateway's amount field.
    #[serde(default = "defaults::amount_multiplier")]
    pub amount_multiplier: i64,
    #[serde(default = "defaults::expiry_minutes")]
    pub expiry_minutes: i64,
    /// Offset of the gateway's local time, used for its timestamps.
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,
    pub return_urls: ReturnUrls,
}

mod defaults {
    pub fn version() -> String {
        "2.1.0".to_string()
    }
    pub fn currency() -> String {
        "VND".to_string()
    }
    pub fn locale() -> String {
        "vn".to_string()
    }
    pub fn order_type() -> String {
        "other".to_string()
    }
    pub fn amount_multiplier() -> i64 {
        100
    }
    pub fn expiry_minutes() -> i64 {
        15
    }
    pub fn utc_offset_hours() -> i32 {
        7
    }
}

impl GatewayConfig {
    /// Reads a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: GatewayConfig = serde_json::from_str(&raw)
            .map_err(|e| PaymentError::ConfigError(format!("invalid gateway config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from `DEALERPAY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| PaymentError::ConfigError(format!("{key} is not set")))
        };
        let parsed = |key: &str, default: i64| -> Result<i64> {
            match lookup(key) {
                Some(v) => v
                    .parse()
                    .map_err(|_| PaymentError::ConfigError(format!("{key} must be an integer"))),
                None => Ok(default),
            }
        };

        let config = GatewayConfig {
            merchant_code: required("DEALERPAY_MERCHANT_CODE")?,
            secret: required("DEALERPAY_SECRET")?,
            base_url: required("DEALERPAY_BASE_URL")?,
            version: lookup("DEALERPAY_VERSION").unwrap_or_else(defaults::version),
            currency: lookup("DEALERPAY_CURRENCY").unwrap_or_else(defaults::currency),
            locale: lookup("DEALERPAY_LOCALE").unwrap_or_else(defaults::locale),
            order_type: lookup("DEALERPAY_ORDER_TYPE").unwrap_or_else(defaults::order_type),
            amount_multiplier: parsed("DEALERPAY_AMOUNT_MULTIPLIER", defaults::amount_multiplier())?,
            expiry_minutes: parsed("DEALERPAY_EXPIRY_MINUTES", defaults::expiry_minutes())?,
            utc_offset_hours: i32::try_from(parsed(
                "DEALERPAY_UTC_OFFSET_HOURS",
                i64::from(defaults::utc_offset_hours()),
            )?)
            .map_err(|_| {
                PaymentError::ConfigError("DEALERPAY_UTC_OFFSET_HOURS is out of range".to_string())
            })?,
            return_urls: ReturnUrls {
                customer_deposit: required("DEALERPAY_RETURN_CUSTOMER_DEPOSIT")?,
                customer_final_balance: required("DEALERPAY_RETURN_CUSTOMER_FINAL")?,
                staff_deposit: required("DEALERPAY_RETURN_STAFF_DEPOSIT")?,
                staff_final_balance: required("DEALERPAY_RETURN_STAFF_FINAL")?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("merchant_code", &self.merchant_code),
            ("secret", &self.secret),
            ("base_url", &self.base_url),
        ] {
            if value.trim().is_empty() {
                return Err(PaymentError::ConfigError(format!("{name} must not be empty")));
            }
        }
        if self.amount_multiplier <= 0 {
            return Err(PaymentError::ConfigError(
                "amount_multiplier must be positive".to_string(),
            ));
        }
        if self.expiry_minutes <= 0 {
            return Err(PaymentError::ConfigError(
                "expiry_minutes must be positive".to_string(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(PaymentError::ConfigError(
                "utc_offset_hours must be between -12 and 14".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> GatewayConfig {
    GatewayConfig {
        merchant_code: "DEALER01".to_string(),
        secret: "SECRETKEY0123456789".to_string(),
        base_url: "https://sandbox.gateway.test/paymentv2/vpcpay.html".to_string(),
        version: defaults::version(),
        currency: defaults::currency(),
        locale: defaults::locale(),
        order_type: defaults::order_type(),
        amount_multiplier: defaults::amount_multiplier(),
        expiry_minutes: defaults::expiry_minutes(),
        utc_offset_hours: defaults::utc_offset_hours(),
        return_urls: ReturnUrls {
            customer_deposit: "https://shop.test/customer/deposit".to_string(),
            customer_final_balance: "https://shop.test/customer/final".to_string(),
            staff_deposit: "https://shop.test/staff/deposit".to_string(),
            staff_final_balance: "https://shop.test/staff/final".to_string(),
        },
    }
}
