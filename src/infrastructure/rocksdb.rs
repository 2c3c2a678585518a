use crate::domain::order::{Order, Product};
use crate::domain::ports::{OrderStore, ProductStore, SessionStore};
use crate::domain::session::{PaymentPurpose, PaymentSession, SessionId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column Family for payment sessions, keyed by session id.
pub const CF_SESSIONS: &str = "sessions";
/// Column Family mapping every issued reference to its session id.
pub const CF_SESSION_REFS: &str = "session_refs";
/// Column Family mapping (order, purpose) to the live session id.
pub const CF_SESSION_CURRENT: &str = "session_current";
/// Column Family for orders.
pub const CF_ORDERS: &str = "orders";
/// Column Family for products.
pub const CF_PRODUCTS: &str = "products";

const COLUMN_FAMILIES: [&str; 5] = [
    CF_SESSIONS,
    CF_SESSION_REFS,
    CF_SESSION_CURRENT,
    CF_ORDERS,
    CF_PRODUCTS,
];

/// A persistent store implementation using RocksDB.
///
/// Sessions, orders and products live in separate Column Families, values are
/// JSON. A session write updates the entry and both of its indexes in one
/// `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::store(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn session_id_at(&self, cf_name: &str, key: &[u8]) -> Result<Option<SessionId>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Uuid::from_slice(&bytes)
                .map(|id| Some(SessionId(id)))
                .map_err(|e| PaymentError::UnderlyingStoreFailure(Box::new(e))),
            None => Ok(None),
        }
    }
}

fn current_key(order_id: u64, purpose: PaymentPurpose) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[..8].copy_from_slice(&order_id.to_be_bytes());
    key[8] = match purpose {
        PaymentPurpose::Deposit => 0,
        PaymentPurpose::FinalBalance => 1,
    };
    key
}

#[async_trait]
impl SessionStore for RocksDBStore {
    async fn store(&self, session: PaymentSession) -> Result<()> {
        let id = *session.id.0.as_bytes();
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_SESSIONS)?, id, serde_json::to_vec(&session)?);
        let refs = self.cf(CF_SESSION_REFS)?;
        for reference in session
            .superseded_references
            .iter()
            .chain(std::iter::once(&session.reference))
        {
            batch.put_cf(refs, reference.as_bytes(), id);
        }
        batch.put_cf(
            self.cf(CF_SESSION_CURRENT)?,
            current_key(session.order_id, session.purpose),
            id,
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<PaymentSession>> {
        let Some(id) = self.session_id_at(CF_SESSION_REFS, reference.as_bytes())? else {
            return Ok(None);
        };
        let session: Option<PaymentSession> = self.get_json(CF_SESSIONS, id.0.as_bytes())?;
        Ok(session.filter(|s| s.reference == reference))
    }

    async fn was_issued(&self, reference: &str) -> Result<bool> {
        let cf = self.cf(CF_SESSION_REFS)?;
        Ok(self.db.get_pinned_cf(cf, reference.as_bytes())?.is_some())
    }

    async fn current(
        &self,
        order_id: u64,
        purpose: PaymentPurpose,
    ) -> Result<Option<PaymentSession>> {
        match self.session_id_at(CF_SESSION_CURRENT, &current_key(order_id, purpose))? {
            Some(id) => self.get_json(CF_SESSIONS, id.0.as_bytes()),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<PaymentSession>> {
        let mut sessions: Vec<PaymentSession> = self.scan_json(CF_SESSIONS)?;
        sessions.sort_by_key(|s| (s.order_id, s.purpose));
        Ok(sessions)
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn store(&self, order: Order) -> Result<()> {
        self.put_json(CF_ORDERS, &order.id.to_be_bytes(), &order)
    }

    async fn get(&self, order_id: u64) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, &order_id.to_be_bytes())
    }

    async fn find_by_product(&self, product_id: u64) -> Result<Vec<Order>> {
        let orders: Vec<Order> = self.scan_json(CF_ORDERS)?;
        Ok(orders
            .into_iter()
            .filter(|o| o.product_id == product_id)
            .collect())
    }
}

#[async_trait]
impl ProductStore for RocksDBStore {
    async fn store(&self, product: Product) -> Result<()> {
        self.put_json(CF_PRODUCTS, &product.id.to_be_bytes(), &product)
    }

    async fn get(&self, product_id: u64) -> Result<Option<Product>> {
        self.get_json(CF_PRODUCTS, &product_id.to_be_bytes())
    }

    async fn find_by_unit(&self, vin: &str, engine_number: &str) -> Result<Vec<Product>> {
        let wanted = Product::new(0, vin, engine_number);
        let products: Vec<Product> = self.scan_json(CF_PRODUCTS)?;
        Ok(products
            .into_iter()
            .filter(|p| p.same_unit_as(&wanted))
            .collect())
    }
}
