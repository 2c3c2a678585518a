use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow label of an order.
///
/// The engine only ever writes the payment and delivery markers; any other
/// label owned by the wider workflow is carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    DepositConfirmed,
    FullyPaid,
    Delivered,
    Canceled,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::DepositConfirmed => "deposit_confirmed",
            OrderStatus::FullyPaid => "fully_paid",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Other(label) => label,
        }
    }

    /// Delivered and canceled orders are never touched by a cascade.
    pub fn is_closed(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => OrderStatus::Pending,
            "deposit_confirmed" => OrderStatus::DepositConfirmed,
            "fully_paid" => OrderStatus::FullyPaid,
            "delivered" => OrderStatus::Delivered,
            "canceled" => OrderStatus::Canceled,
            _ => OrderStatus::Other(s),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Available,
    Reserved,
    Sold,
}

/// A dealer order for one physical vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    /// Integral minor currency units.
    pub total: i64,
    pub status: OrderStatus,
    pub product_id: u64,
    #[serde(default)]
    pub note: Option<String>,
}

impl Order {
    pub fn new(id: u64, total: i64, product_id: u64) -> Self {
        Self {
            id,
            total,
            status: OrderStatus::Pending,
            product_id,
            note: None,
        }
    }
}

/// A physical vehicle, identified by VIN and engine number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub vin: String,
    pub engine_number: String,
    pub status: ProductStatus,
}

impl Product {
    pub fn new(id: u64, vin: impl Into<String>, engine_number: impl Into<String>) -> Self {
        Self {
            id,
            vin: vin.into(),
            engine_number: engine_number.into(),
            status: ProductStatus::Available,
        }
    }

    /// Whether both records describe the same physical unit.
    pub fn same_unit_as(&self, other: &Product) -> bool {
        (!self.vin.is_empty() && self.vin == other.vin)
            || (!self.engine_number.is_empty() && self.engine_number == other.engine_number)
    }
}
