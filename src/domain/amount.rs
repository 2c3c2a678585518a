use crate::domain::session::PaymentPurpose;
use crate::error::PaymentError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An order total in integral minor currency units.
///
/// Totals are always positive; the session amounts are derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderTotal(i64);

impl OrderTotal {
    pub fn new(value: i64) -> Result<Self, PaymentError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Order total must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for OrderTotal {
    type Error = PaymentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// `round(total × fraction)` with halves rounded away from zero.
pub fn fraction_of(total: OrderTotal, purpose: PaymentPurpose) -> Result<i64, PaymentError> {
    (Decimal::from(total.value()) * purpose.fraction())
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| PaymentError::ValidationError("Amount out of range".to_string()))
}

pub fn deposit_amount(total: OrderTotal) -> Result<i64, PaymentError> {
    fraction_of(total, PaymentPurpose::Deposit)
}

/// Whatever the paid deposit did not cover, so the two sessions always sum
/// to the total the final balance is requested against.
pub fn final_balance_amount(total: OrderTotal, paid_deposit: i64) -> Result<i64, PaymentError> {
    let remaining = total.value() - paid_deposit;
    if remaining > 0 {
        Ok(remaining)
    } else {
        Err(PaymentError::ValidationError(format!(
            "Order total {} is already covered by the paid deposit {}",
            total.value(),
            paid_deposit
        )))
    }
}
