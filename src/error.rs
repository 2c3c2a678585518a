use crate::domain::session::PaymentPurpose;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum PaymentError {
    #[error("final balance requested for order {order_id} before its deposit was paid")]
    #[diagnostic(
        code(dealerpay::sequence),
        help("pay the deposit for this order first")
    )]
    InvalidPaymentSequence { order_id: u64 },
    #[error("{purpose} for order {order_id} is already paid")]
    #[diagnostic(code(dealerpay::already_paid))]
    AlreadyPaid {
        order_id: u64,
        purpose: PaymentPurpose,
    },
    #[error("callback signature verification failed")]
    InvalidSignature,
    #[error("no payment session matches reference {0}")]
    SessionNotFound(String),
    #[error("order {0} not found")]
    OrderNotFound(u64),
    #[error("product {0} not found")]
    ProductNotFound(u64),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Store failure: {0}")]
    UnderlyingStoreFailure(Box<dyn std::error::Error + Send + Sync>),
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(dealerpay::config),
        help("pass --config FILE or set the DEALERPAY_* environment variables")
    )]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PaymentError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::UnderlyingStoreFailure(message.into().into())
    }

    /// Errors that must reach an operator, not just the immediate caller.
    pub fn is_operational_alert(&self) -> bool {
        matches!(
            self,
            PaymentError::InvalidSignature | PaymentError::UnderlyingStoreFailure(_)
        )
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(e: rocksdb::Error) -> Self {
        PaymentError::UnderlyingStoreFailure(Box::new(e))
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(e: serde_json::Error) -> Self {
        PaymentError::UnderlyingStoreFailure(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
