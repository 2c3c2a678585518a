//! Typed records for the gateway's wire parameters.
//!
//! The gateway speaks in flat string maps. Everything inside the engine works
//! with `PaymentRequestParams` and `CallbackParams`; conversion to and from the
//! loosely typed map happens only here.

use std::collections::BTreeMap;
use tracing::debug;

pub const VERSION: &str = "vnp_Version";
pub const COMMAND: &str = "vnp_Command";
pub const MERCHANT_CODE: &str = "vnp_TmnCode";
pub const AMOUNT: &str = "vnp_Amount";
pub const CURRENCY: &str = "vnp_CurrCode";
pub const REFERENCE: &str = "vnp_TxnRef";
pub const ORDER_INFO: &str = "vnp_OrderInfo";
pub const ORDER_TYPE: &str = "vnp_OrderType";
pub const BANK_CODE: &str = "vnp_BankCode";
pub const LOCALE: &str = "vnp_Locale";
pub const RETURN_URL: &str = "vnp_ReturnUrl";
pub const CLIENT_IP: &str = "vnp_IpAddr";
pub const CREATE_DATE: &str = "vnp_CreateDate";
pub const EXPIRE_DATE: &str = "vnp_ExpireDate";
pub const RESPONSE_CODE: &str = "vnp_ResponseCode";
pub const TRANSACTION_STATUS: &str = "vnp_TransactionStatus";
pub const TRANSACTION_NO: &str = "vnp_TransactionNo";
pub const BANK_TRANSACTION_NO: &str = "vnp_BankTranNo";
pub const CARD_TYPE: &str = "vnp_CardType";
pub const PAY_DATE: &str = "vnp_PayDate";
pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Fields that never take part in the signed payload.
pub const SIGNATURE_FIELDS: [&str; 2] = [SECURE_HASH, SECURE_HASH_TYPE];

/// Gateway timestamp layout (`yyyyMMddHHmmss`).
pub const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Outbound payment request, before signing.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequestParams {
    pub version: String,
    pub command: String,
    pub merchant_code: String,
    /// Already scaled to the gateway's unit convention.
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub order_info: String,
    pub order_type: String,
    pub bank_code: Option<String>,
    pub locale: String,
    pub return_url: String,
    pub client_ip: String,
    pub create_date: String,
    pub expire_date: String,
}

impl PaymentRequestParams {
    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(VERSION.to_string(), self.version.clone());
        params.insert(COMMAND.to_string(), self.command.clone());
        params.insert(MERCHANT_CODE.to_string(), self.merchant_code.clone());
        params.insert(AMOUNT.to_string(), self.amount.to_string());
        params.insert(CURRENCY.to_string(), self.currency.clone());
        params.insert(REFERENCE.to_string(), self.reference.clone());
        params.insert(ORDER_INFO.to_string(), self.order_info.clone());
        params.insert(ORDER_TYPE.to_string(), self.order_type.clone());
        if let Some(bank) = &self.bank_code {
            params.insert(BANK_CODE.to_string(), bank.clone());
        }
        params.insert(LOCALE.to_string(), self.locale.clone());
        params.insert(RETURN_URL.to_string(), self.return_url.clone());
        params.insert(CLIENT_IP.to_string(), self.client_ip.clone());
        params.insert(CREATE_DATE.to_string(), self.create_date.clone());
        params.insert(EXPIRE_DATE.to_string(), self.expire_date.clone());
        params
    }
}

/// Inbound callback as reported by the gateway.
///
/// Values are kept verbatim so the signed payload can be rebuilt exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackParams {
    pub version: Option<String>,
    pub command: Option<String>,
    pub merchant_code: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub reference: Option<String>,
    pub order_info: Option<String>,
    pub order_type: Option<String>,
    pub bank_code: Option<String>,
    pub bank_transaction_no: Option<String>,
    pub card_type: Option<String>,
    pub pay_date: Option<String>,
    pub locale: Option<String>,
    pub return_url: Option<String>,
    pub client_ip: Option<String>,
    pub create_date: Option<String>,
    pub expire_date: Option<String>,
    pub response_code: Option<String>,
    pub transaction_status: Option<String>,
    pub transaction_no: Option<String>,
    pub secure_hash: Option<String>,
    pub secure_hash_type: Option<String>,
}

impl CallbackParams {
    pub fn from_params<K, V>(raw: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut cb = Self::default();
        for (key, value) in raw {
            let value = Some(value.into());
            match key.as_ref() {
                VERSION => cb.version = value,
                COMMAND => cb.command = value,
                MERCHANT_CODE => cb.merchant_code = value,
                AMOUNT => cb.amount = value,
                CURRENCY => cb.currency = value,
                REFERENCE => cb.reference = value,
                ORDER_INFO => cb.order_info = value,
                ORDER_TYPE => cb.order_type = value,
                BANK_CODE => cb.bank_code = value,
                BANK_TRANSACTION_NO => cb.bank_transaction_no = value,
                CARD_TYPE => cb.card_type = value,
                PAY_DATE => cb.pay_date = value,
                LOCALE => cb.locale = value,
                RETURN_URL => cb.return_url = value,
                CLIENT_IP => cb.client_ip = value,
                CREATE_DATE => cb.create_date = value,
                EXPIRE_DATE => cb.expire_date = value,
                RESPONSE_CODE => cb.response_code = value,
                TRANSACTION_STATUS => cb.transaction_status = value,
                TRANSACTION_NO => cb.transaction_no = value,
                SECURE_HASH => cb.secure_hash = value,
                SECURE_HASH_TYPE => cb.secure_hash_type = value,
                other => debug!(field = other, "ignoring unknown callback field"),
            }
        }
        cb
    }

    /// The fields covered by the gateway's signature.
    pub fn signed_fields(&self) -> Vec<(&'static str, &str)> {
        [
            (VERSION, &self.version),
            (COMMAND, &self.command),
            (MERCHANT_CODE, &self.merchant_code),
            (AMOUNT, &self.amount),
            (CURRENCY, &self.currency),
            (REFERENCE, &self.reference),
            (ORDER_INFO, &self.order_info),
            (ORDER_TYPE, &self.order_type),
            (BANK_CODE, &self.bank_code),
            (BANK_TRANSACTION_NO, &self.bank_transaction_no),
            (CARD_TYPE, &self.card_type),
            (PAY_DATE, &self.pay_date),
            (LOCALE, &self.locale),
            (RETURN_URL, &self.return_url),
            (CLIENT_IP, &self.client_ip),
            (CREATE_DATE, &self.create_date),
            (EXPIRE_DATE, &self.expire_date),
            (RESPONSE_CODE, &self.response_code),
            (TRANSACTION_STATUS, &self.transaction_status),
            (TRANSACTION_NO, &self.transaction_no),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }

    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = self
            .signed_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(hash) = &self.secure_hash {
            params.insert(SECURE_HASH.to_string(), hash.clone());
        }
        if let Some(kind) = &self.secure_hash_type {
            params.insert(SECURE_HASH_TYPE.to_string(), kind.clone());
        }
        params
    }

    /// Success requires the response code and, when present, the
    /// transaction status to both report `00`.
    pub fn reports_success(&self) -> bool {
        let code_ok = self
            .response_code
            .as_deref()
            .is_some_and(crate::domain::response_code::is_success);
        let status_ok = self
            .transaction_status
            .as_deref()
            .is_none_or(crate::domain::response_code::is_success);
        code_ok && status_ok
    }
}
