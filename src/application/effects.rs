use crate::application::locks::KeyedLocks;
use crate::domain::alert::OperatorAlert;
use crate::domain::order::{Order, OrderStatus, Product, ProductStatus};
use crate::domain::ports::{SharedAlertSink, SharedOrderStore, SharedProductStore};
use crate::domain::session::{PaymentPurpose, PaymentSession};
use crate::error::{PaymentError, Result};
use serde::Serialize;
use tracing::{error, info, warn};

/// A sibling order the cascade could not cancel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeFailure {
    pub order_id: Option<u64>,
    pub product_id: u64,
    pub reason: String,
}

/// Outcome of a delivery confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub order_id: u64,
    pub product_id: u64,
    pub canceled: Vec<u64>,
    pub failures: Vec<CascadeFailure>,
}

impl DeliveryReport {
    fn empty(order: &Order) -> Self {
        Self {
            order_id: order.id,
            product_id: order.product_id,
            canceled: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Sole writer of product status; applies the business consequences of
/// settled payments and deliveries to orders and products.
pub struct EffectHandler {
    orders: SharedOrderStore,
    products: SharedProductStore,
    alerts: SharedAlertSink,
    locks: KeyedLocks,
}

impl EffectHandler {
    pub fn new(
        orders: SharedOrderStore,
        products: SharedProductStore,
        alerts: SharedAlertSink,
        locks: KeyedLocks,
    ) -> Self {
        Self {
            orders,
            products,
            alerts,
            locks,
        }
    }

    /// Applies a session's transition to PAID.
    ///
    /// Runs under the same unit locks as `confirm_delivery`, so a payment can
    /// never reopen an order a delivery cascade has just canceled.
    pub async fn apply_payment(&self, session: &PaymentSession) -> Result<()> {
        let order = self.load_order(session.order_id).await?;
        let product = self.load_product(order.product_id).await?;

        let _guards = self
            .locks
            .lock_all(unit_lock_keys(&product))
            .await;

        let mut order = self.load_order(session.order_id).await?;
        if order.status.is_closed() {
            return Err(PaymentError::ValidationError(format!(
                "order {} is {} and cannot take a {} payment",
                order.id, order.status, session.purpose
            )));
        }
        let mut product = self.load_product(order.product_id).await?;

        order.status = match session.purpose {
            PaymentPurpose::Deposit => OrderStatus::DepositConfirmed,
            PaymentPurpose::FinalBalance => OrderStatus::FullyPaid,
        };
        if product.status != ProductStatus::Sold {
            product.status = ProductStatus::Reserved;
        }

        self.orders.store(order.clone()).await?;
        self.products.store(product.clone()).await?;
        info!(
            order_id = order.id,
            product_id = product.id,
            status = %order.status,
            "payment effects applied"
        );
        Ok(())
    }

    /// Marks an order delivered, sells its vehicle and cancels every other
    /// open order that points at the same physical unit.
    ///
    /// Siblings that fail to update are reported and alerted; the cascade
    /// keeps going.
    pub async fn confirm_delivery(&self, order_id: u64) -> Result<DeliveryReport> {
        let order = self.load_order(order_id).await?;
        let product = self.load_product(order.product_id).await?;

        let _guards = self
            .locks
            .lock_all(unit_lock_keys(&product))
            .await;

        // Re-read under the unit lock; a sibling delivery may have just run.
        let mut order = self.load_order(order_id).await?;
        let mut product = self.load_product(order.product_id).await?;
        match order.status {
            OrderStatus::Delivered => return Ok(DeliveryReport::empty(&order)),
            OrderStatus::Canceled => {
                return Err(PaymentError::ValidationError(format!(
                    "order {order_id} is canceled and cannot be delivered"
                )));
            }
            _ => {}
        }

        order.status = OrderStatus::Delivered;
        product.status = ProductStatus::Sold;
        self.orders.store(order.clone()).await?;
        self.products.store(product.clone()).await?;
        info!(order_id, product_id = product.id, vin = %product.vin, "order delivered");

        let mut report = DeliveryReport::empty(&order);
        let note = format!(
            "Canceled: vehicle VIN {} / engine {} was delivered under order {}",
            product.vin, product.engine_number, order.id
        );

        let unit = match self
            .products
            .find_by_unit(&product.vin, &product.engine_number)
            .await
        {
            Ok(unit) => unit,
            Err(e) => {
                self.cascade_failed(&mut report, None, product.id, e).await;
                return Ok(report);
            }
        };

        for sibling_product in unit {
            let siblings = match self.orders.find_by_product(sibling_product.id).await {
                Ok(siblings) => siblings,
                Err(e) => {
                    self.cascade_failed(&mut report, None, sibling_product.id, e)
                        .await;
                    continue;
                }
            };

            for mut sibling in siblings {
                if sibling.id == order.id || sibling.status.is_closed() {
                    continue;
                }
                sibling.status = OrderStatus::Canceled;
                sibling.note = Some(note.clone());
                let sibling_id = sibling.id;
                match self.orders.store(sibling).await {
                    Ok(()) => report.canceled.push(sibling_id),
                    Err(e) => {
                        self.cascade_failed(&mut report, Some(sibling_id), sibling_product.id, e)
                            .await
                    }
                }
            }
        }

        if !report.canceled.is_empty() {
            info!(
                order_id,
                canceled = ?report.canceled,
                "canceled orders competing for the delivered vehicle"
            );
        }
        Ok(report)
    }

    async fn cascade_failed(
        &self,
        report: &mut DeliveryReport,
        order_id: Option<u64>,
        product_id: u64,
        error: PaymentError,
    ) {
        if error.is_operational_alert() {
            error!(
                source_order_id = report.order_id,
                order_id = ?order_id,
                product_id,
                error = %error,
                alert = true,
                "cascade cancellation step failed"
            );
        } else {
            warn!(
                source_order_id = report.order_id,
                order_id = ?order_id,
                product_id,
                error = %error,
                alert = true,
                "cascade cancellation step failed"
            );
        }
        let reason = error.to_string();
        self.alerts
            .raise(OperatorAlert::CascadeFailure {
                order_id,
                product_id,
                source_order_id: report.order_id,
                reason: reason.clone(),
            })
            .await;
        report.failures.push(CascadeFailure {
            order_id,
            product_id,
            reason,
        });
    }

    async fn load_order(&self, order_id: u64) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))
    }

    async fn load_product(&self, product_id: u64) -> Result<Product> {
        self.products
            .get(product_id)
            .await?
            .ok_or(PaymentError::ProductNotFound(product_id))
    }
}

fn unit_lock_keys(product: &Product) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    if !product.vin.is_empty() {
        keys.push(format!("vin:{}", product.vin));
    }
    if !product.engine_number.is_empty() {
        keys.push(format!("engine:{}", product.engine_number));
    }
    if keys.is_empty() {
        keys.push(format!("product:{}", product.id));
    }
    keys
}
