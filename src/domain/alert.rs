use serde::Serialize;
use std::fmt;

/// Something an operator has to look at; raised when the engine chose to
/// continue rather than fail the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperatorAlert {
    InvalidSignature {
        reference: Option<String>,
    },
    /// A callback arrived for a reference that a retry already replaced.
    StaleCallback {
        reference: String,
    },
    /// A sibling order of a delivered unit could not be canceled.
    /// `order_id` is absent when the sibling lookup itself failed.
    CascadeFailure {
        order_id: Option<u64>,
        product_id: u64,
        source_order_id: u64,
        reason: String,
    },
    EffectFailure {
        reference: String,
        reason: String,
    },
}

impl fmt::Display for OperatorAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorAlert::InvalidSignature { reference } => write!(
                f,
                "invalid callback signature (reference {})",
                reference.as_deref().unwrap_or("<none>")
            ),
            OperatorAlert::StaleCallback { reference } => {
                write!(f, "callback for superseded reference {reference}")
            }
            OperatorAlert::CascadeFailure {
                order_id: Some(order_id),
                source_order_id,
                reason,
                ..
            } => write!(
                f,
                "could not cancel order {order_id} after delivery of order {source_order_id}: {reason}"
            ),
            OperatorAlert::CascadeFailure {
                order_id: None,
                product_id,
                source_order_id,
                reason,
            } => write!(
                f,
                "could not list orders of product {product_id} after delivery of order {source_order_id}: {reason}"
            ),
            OperatorAlert::EffectFailure { reference, reason } => {
                write!(f, "payment {reference} settled but its effects failed: {reason}")
            }
        }
    }
}
