use crate::domain::order::{Order, Product};
use crate::domain::ports::{OrderStore, ProductStore, SessionStore};
use crate::domain::session::{PaymentPurpose, PaymentSession, SessionId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Ledger {
    sessions: HashMap<SessionId, PaymentSession>,
    /// Every reference ever issued, current or superseded.
    references: HashMap<String, SessionId>,
    current: HashMap<(u64, PaymentPurpose), SessionId>,
}

/// A thread-safe in-memory payment ledger.
///
/// Sessions are keyed by id; a reference index resolves callbacks and a
/// (order, purpose) index points at the live entry.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemorySessionStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store(&self, session: PaymentSession) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        for reference in session
            .superseded_references
            .iter()
            .chain(std::iter::once(&session.reference))
        {
            ledger.references.insert(reference.clone(), session.id);
        }
        ledger
            .current
            .insert((session.order_id, session.purpose), session.id);
        ledger.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<PaymentSession>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .references
            .get(reference)
            .and_then(|id| ledger.sessions.get(id))
            .filter(|s| s.reference == reference)
            .cloned())
    }

    async fn was_issued(&self, reference: &str) -> Result<bool> {
        let ledger = self.ledger.read().await;
        Ok(ledger.references.contains_key(reference))
    }

    async fn current(
        &self,
        order_id: u64,
        purpose: PaymentPurpose,
    ) -> Result<Option<PaymentSession>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .current
            .get(&(order_id, purpose))
            .and_then(|id| ledger.sessions.get(id))
            .cloned())
    }

    async fn get_all(&self) -> Result<Vec<PaymentSession>> {
        let ledger = self.ledger.read().await;
        let mut sessions: Vec<PaymentSession> = ledger.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| (s.order_id, s.purpose));
        Ok(sessions)
    }
}

/// A thread-safe in-memory store for orders.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<u64, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn store(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: u64) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn find_by_product(&self, product_id: u64) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|o| o.product_id == product_id)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.id);
        Ok(found)
    }
}

/// A thread-safe in-memory store for products.
#[derive(Default, Clone)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<u64, Product>>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn store(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        products.insert(product.id, product);
        Ok(())
    }

    async fn get(&self, product_id: u64) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(&product_id).cloned())
    }

    async fn find_by_unit(&self, vin: &str, engine_number: &str) -> Result<Vec<Product>> {
        let wanted = Product::new(0, vin, engine_number);
        let products = self.products.read().await;
        let mut found: Vec<Product> = products
            .values()
            .filter(|p| p.same_unit_as(&wanted))
            .cloned()
            .collect();
        found.sort_by_key(|p| p.id);
        Ok(found)
    }
}
