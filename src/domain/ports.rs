use super::alert::OperatorAlert;
use super::order::{Order, Product};
use super::session::{PaymentPurpose, PaymentSession};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The payment ledger.
///
/// Every reference a session ever carried is indexed, but only the current
/// one resolves through `get_by_reference`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, session: PaymentSession) -> Result<()>;
    async fn get_by_reference(&self, reference: &str) -> Result<Option<PaymentSession>>;
    /// Whether `reference` was ever issued, current or superseded.
    async fn was_issued(&self, reference: &str) -> Result<bool>;
    async fn current(&self, order_id: u64, purpose: PaymentPurpose)
    -> Result<Option<PaymentSession>>;
    async fn get_all(&self) -> Result<Vec<PaymentSession>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn store(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: u64) -> Result<Option<Order>>;
    async fn find_by_product(&self, product_id: u64) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn store(&self, product: Product) -> Result<()>;
    async fn get(&self, product_id: u64) -> Result<Option<Product>>;
    /// All products sharing the VIN or the engine number.
    async fn find_by_unit(&self, vin: &str, engine_number: &str) -> Result<Vec<Product>>;
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise(&self, alert: OperatorAlert);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedSessionStore = Arc<dyn SessionStore>;
pub type SharedOrderStore = Arc<dyn OrderStore>;
pub type SharedProductStore = Arc<dyn ProductStore>;
pub type SharedAlertSink = Arc<dyn AlertSink>;
pub type SharedClock = Arc<dyn Clock>;
