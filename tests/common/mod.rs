#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dealerpay::application::engine::{PaymentEngine, Stores};
use dealerpay::application::signature::SignatureEngine;
use dealerpay::config::{GatewayConfig, ReturnUrls};
use dealerpay::domain::gateway;
use dealerpay::domain::order::{Order, OrderStatus, Product};
use dealerpay::domain::ports::{
    OrderStore, ProductStore, SessionStore, SharedOrderStore, SharedSessionStore,
};
use dealerpay::domain::session::{PaymentPurpose, PaymentSession};
use dealerpay::error::{PaymentError, Result};
use dealerpay::infrastructure::alerts::CollectingAlertSink;
use dealerpay::infrastructure::clock::FixedClock;
use dealerpay::infrastructure::in_memory::{
    InMemoryOrderStore, InMemoryProductStore, InMemorySessionStore,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SECRET: &str = "SECRETKEY0123456789";
pub const MERCHANT: &str = "DEALER01";

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        merchant_code: MERCHANT.to_string(),
        secret: SECRET.to_string(),
        base_url: "https://sandbox.gateway.test/paymentv2/vpcpay.html".to_string(),
        version: "2.1.0".to_string(),
        currency: "VND".to_string(),
        locale: "vn".to_string(),
        order_type: "other".to_string(),
        amount_multiplier: 100,
        expiry_minutes: 15,
        utc_offset_hours: 7,
        return_urls: ReturnUrls {
            customer_deposit: "https://shop.test/customer/deposit".to_string(),
            customer_final_balance: "https://shop.test/customer/final".to_string(),
            staff_deposit: "https://shop.test/staff/deposit".to_string(),
            staff_final_balance: "https://shop.test/staff/final".to_string(),
        },
    }
}

/// An engine over in-memory stores, with handles to everything it touches.
pub struct Harness {
    pub engine: PaymentEngine,
    pub sessions: InMemorySessionStore,
    pub orders: InMemoryOrderStore,
    pub products: InMemoryProductStore,
    pub alerts: CollectingAlertSink,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_stores(
            |sessions| Arc::new(sessions) as SharedSessionStore,
            |orders| Arc::new(orders) as SharedOrderStore,
        )
    }

    /// Lets a test put a wrapper between the engine and the order store.
    /// Seeding through `Harness::orders` bypasses the wrapper.
    pub fn with_order_store(wrap: impl FnOnce(InMemoryOrderStore) -> SharedOrderStore) -> Self {
        Self::with_stores(|sessions| Arc::new(sessions) as SharedSessionStore, wrap)
    }

    pub fn with_session_store(
        wrap: impl FnOnce(InMemorySessionStore) -> SharedSessionStore,
    ) -> Self {
        Self::with_stores(wrap, |orders| Arc::new(orders) as SharedOrderStore)
    }

    pub fn with_stores(
        wrap_sessions: impl FnOnce(InMemorySessionStore) -> SharedSessionStore,
        wrap_orders: impl FnOnce(InMemoryOrderStore) -> SharedOrderStore,
    ) -> Self {
        let sessions = InMemorySessionStore::new();
        let orders = InMemoryOrderStore::new();
        let products = InMemoryProductStore::new();
        let alerts = CollectingAlertSink::new();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap(),
        ));

        let engine = PaymentEngine::new(
            gateway_config(),
            Stores {
                sessions: wrap_sessions(sessions.clone()),
                orders: wrap_orders(orders.clone()),
                products: Arc::new(products.clone()),
            },
            Arc::new(alerts.clone()),
            clock.clone(),
        )
        .unwrap();

        Self {
            engine,
            sessions,
            orders,
            products,
            alerts,
            clock,
        }
    }

    pub async fn seed(&self, order_id: u64, total: i64, product_id: u64, vin: &str, engine: &str) {
        ProductStore::store(&self.products, Product::new(product_id, vin, engine))
            .await
            .unwrap();
        OrderStore::store(&self.orders, Order::new(order_id, total, product_id))
            .await
            .unwrap();
    }

    pub async fn order(&self, order_id: u64) -> Order {
        OrderStore::get(&self.orders, order_id).await.unwrap().unwrap()
    }

    pub async fn product(&self, product_id: u64) -> Product {
        ProductStore::get(&self.products, product_id)
            .await
            .unwrap()
            .unwrap()
    }
}

/// Callback fields the gateway would send for `session`, signed with the
/// shared secret.
pub fn signed_callback(session: &PaymentSession, response_code: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert(gateway::MERCHANT_CODE.to_string(), MERCHANT.to_string());
    params.insert(gateway::AMOUNT.to_string(), (session.amount * 100).to_string());
    params.insert(gateway::REFERENCE.to_string(), session.reference.clone());
    params.insert(
        gateway::ORDER_INFO.to_string(),
        format!("Payment of {} for order {}", session.purpose, session.order_id),
    );
    params.insert(gateway::BANK_CODE.to_string(), "NCB".to_string());
    params.insert(gateway::PAY_DATE.to_string(), "20240301091000".to_string());
    params.insert(gateway::RESPONSE_CODE.to_string(), response_code.to_string());
    params.insert(
        gateway::TRANSACTION_STATUS.to_string(),
        response_code.to_string(),
    );
    params.insert(gateway::TRANSACTION_NO.to_string(), "14000001".to_string());
    sign(params)
}

/// Replaces any signature on `params` with a fresh one.
pub fn sign(mut params: BTreeMap<String, String>) -> BTreeMap<String, String> {
    params.remove(gateway::SECURE_HASH);
    params.remove(gateway::SECURE_HASH_TYPE);
    let hash = SignatureEngine::new(SECRET).unwrap().sign_params(&params);
    params.insert(gateway::SECURE_HASH.to_string(), hash);
    params.insert(
        gateway::SECURE_HASH_TYPE.to_string(),
        "HmacSHA512".to_string(),
    );
    params
}

/// Order store that counts writes and refuses to cancel chosen orders.
#[derive(Clone)]
pub struct FaultyOrderStore {
    inner: InMemoryOrderStore,
    refuse_cancel: HashSet<u64>,
    writes: Arc<AtomicUsize>,
}

impl FaultyOrderStore {
    pub fn new(inner: InMemoryOrderStore, refuse_cancel: impl IntoIterator<Item = u64>) -> Self {
        Self {
            inner,
            refuse_cancel: refuse_cancel.into_iter().collect(),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for FaultyOrderStore {
    async fn store(&self, order: Order) -> Result<()> {
        if order.status == OrderStatus::Canceled && self.refuse_cancel.contains(&order.id) {
            return Err(PaymentError::store(format!("write to order {} timed out", order.id)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.store(order).await
    }

    async fn get(&self, order_id: u64) -> Result<Option<Order>> {
        self.inner.get(order_id).await
    }

    async fn find_by_product(&self, product_id: u64) -> Result<Vec<Order>> {
        self.inner.find_by_product(product_id).await
    }
}

/// Ledger whose `current` lookups take `delay`, widening the window between
/// a session reset's read and its write.
#[derive(Clone)]
pub struct SlowLedger {
    inner: InMemorySessionStore,
    delay: Duration,
}

impl SlowLedger {
    pub fn new(inner: InMemorySessionStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl SessionStore for SlowLedger {
    async fn store(&self, session: PaymentSession) -> Result<()> {
        self.inner.store(session).await
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<PaymentSession>> {
        self.inner.get_by_reference(reference).await
    }

    async fn was_issued(&self, reference: &str) -> Result<bool> {
        self.inner.was_issued(reference).await
    }

    async fn current(
        &self,
        order_id: u64,
        purpose: PaymentPurpose,
    ) -> Result<Option<PaymentSession>> {
        tokio::time::sleep(self.delay).await;
        self.inner.current(order_id, purpose).await
    }

    async fn get_all(&self) -> Result<Vec<PaymentSession>> {
        self.inner.get_all().await
    }
}

/// Order store whose reads of chosen orders take `delay`.
#[derive(Clone)]
pub struct SlowOrderStore {
    inner: InMemoryOrderStore,
    slow: HashSet<u64>,
    delay: Duration,
}

impl SlowOrderStore {
    pub fn new(inner: InMemoryOrderStore, slow: impl IntoIterator<Item = u64>, delay: Duration) -> Self {
        Self {
            inner,
            slow: slow.into_iter().collect(),
            delay,
        }
    }
}

#[async_trait]
impl OrderStore for SlowOrderStore {
    async fn store(&self, order: Order) -> Result<()> {
        self.inner.store(order).await
    }

    async fn get(&self, order_id: u64) -> Result<Option<Order>> {
        if self.slow.contains(&order_id) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.get(order_id).await
    }

    async fn find_by_product(&self, product_id: u64) -> Result<Vec<Order>> {
        self.inner.find_by_product(product_id).await
    }
}
