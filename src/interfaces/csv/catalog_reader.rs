use crate::domain::order::{Order, OrderStatus, Product, ProductStatus};
use crate::domain::ports::{OrderStore, ProductStore};
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

/// One row of an order catalog: an order and the vehicle it is for.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CatalogRow {
    pub order_id: u64,
    pub total: i64,
    #[serde(default)]
    pub status: Option<String>,
    pub product_id: u64,
    pub vin: String,
    pub engine_number: String,
    #[serde(default)]
    pub product_status: Option<ProductStatus>,
}

impl CatalogRow {
    pub fn into_records(self) -> (Order, Product) {
        let mut order = Order::new(self.order_id, self.total, self.product_id);
        if let Some(status) = self.status.filter(|s| !s.is_empty()) {
            order.status = OrderStatus::from(status);
        }
        let mut product = Product::new(self.product_id, self.vin, self.engine_number);
        if let Some(status) = self.product_status {
            product.status = status;
        }
        (order, product)
    }
}

/// Reads an order catalog, one `CatalogRow` per record. Fields are trimmed and
/// a missing trailing `product_status` column is accepted.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<CatalogRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }

    /// Loads every row into the stores. Unreadable rows are skipped and
    /// counted; store failures abort the load.
    pub async fn load_into(
        self,
        orders: &dyn OrderStore,
        products: &dyn ProductStore,
    ) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        for row in self.rows() {
            match row {
                Ok(row) => {
                    let (order, product) = row.into_records();
                    products.store(product).await?;
                    orders.store(order).await?;
                    summary.loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable catalog row");
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
}
