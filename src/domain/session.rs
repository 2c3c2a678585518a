use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which portion of the order total a session covers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Deposit,
    FinalBalance,
}

impl PaymentPurpose {
    /// Share of the order total this purpose pays.
    pub fn fraction(&self) -> Decimal {
        match self {
            PaymentPurpose::Deposit => dec!(0.30),
            PaymentPurpose::FinalBalance => dec!(0.70),
        }
    }

    /// Token embedded in the external reference.
    pub fn reference_tag(&self) -> &'static str {
        match self {
            PaymentPurpose::Deposit => "DEPOSIT",
            PaymentPurpose::FinalBalance => "FINAL",
        }
    }

    pub fn from_reference_tag(tag: &str) -> Option<Self> {
        match tag {
            "DEPOSIT" => Some(PaymentPurpose::Deposit),
            "FINAL" => Some(PaymentPurpose::FinalBalance),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentPurpose::Deposit => write!(f, "deposit"),
            PaymentPurpose::FinalBalance => write!(f, "final balance"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// External reference sent to the gateway: `{orderId}_{PURPOSE}_{millis}`.
///
/// The order id must stay the first `_`-separated segment; callbacks are
/// correlated by splitting on it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PaymentReference {
    pub order_id: u64,
    pub purpose: PaymentPurpose,
    pub created_millis: i64,
}

impl PaymentReference {
    pub fn new(order_id: u64, purpose: PaymentPurpose, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            purpose,
            created_millis: created_at.timestamp_millis(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '_');
        let order_id = parts.next()?.parse().ok()?;
        let purpose = PaymentPurpose::from_reference_tag(parts.next()?)?;
        let created_millis = parts.next()?.parse().ok()?;
        Some(Self {
            order_id,
            purpose,
            created_millis,
        })
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.order_id,
            self.purpose.reference_tag(),
            self.created_millis
        )
    }
}

/// Fields reported by the gateway when a callback is reconciled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementDetails {
    pub external_transaction_id: Option<String>,
    pub bank_code: Option<String>,
    pub response_code: String,
}

/// One ledger entry: the attempt to pay one purpose of one order.
///
/// A retry resets the entry in place under a new reference; earlier
/// references are kept in `superseded_references` and never resolve again.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentSession {
    pub id: SessionId,
    pub order_id: u64,
    pub purpose: PaymentPurpose,
    pub reference: String,
    #[serde(default)]
    pub superseded_references: Vec<String>,
    /// Integral minor currency units.
    pub amount: i64,
    pub state: SessionState,
    pub external_transaction_id: Option<String>,
    pub bank_code: Option<String>,
    pub response_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn new(order_id: u64, purpose: PaymentPurpose, amount: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            order_id,
            purpose,
            reference: PaymentReference::new(order_id, purpose, now).to_string(),
            superseded_references: Vec::new(),
            amount,
            state: SessionState::Pending,
            external_transaction_id: None,
            bank_code: None,
            response_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.state == SessionState::Paid
    }

    pub fn is_pending(&self) -> bool {
        self.state == SessionState::Pending
    }

    /// Starts a fresh attempt on this entry under a newly minted reference.
    pub fn reset(&mut self, amount: i64, now: DateTime<Utc>) {
        let mut millis = now.timestamp_millis();
        let next = loop {
            let candidate = PaymentReference {
                order_id: self.order_id,
                purpose: self.purpose,
                created_millis: millis,
            }
            .to_string();
            if candidate != self.reference && !self.superseded_references.contains(&candidate) {
                break candidate;
            }
            millis += 1;
        };

        let previous = std::mem::replace(&mut self.reference, next);
        self.superseded_references.push(previous);
        self.amount = amount;
        self.state = SessionState::Pending;
        self.external_transaction_id = None;
        self.bank_code = None;
        self.response_code = None;
        self.created_at = Utc.timestamp_millis_opt(millis).single().unwrap_or(now);
        self.updated_at = now;
    }

    pub fn mark_paid(&mut self, details: SettlementDetails, now: DateTime<Utc>) {
        self.state = SessionState::Paid;
        self.external_transaction_id = details.external_transaction_id;
        self.bank_code = details.bank_code;
        self.response_code = Some(details.response_code);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, details: SettlementDetails, now: DateTime<Utc>) {
        self.state = SessionState::Failed;
        self.external_transaction_id = details.external_transaction_id;
        self.bank_code = details.bank_code;
        self.response_code = Some(details.response_code);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_reference_format_and_parse() {
        let reference = PaymentReference::new(17, PaymentPurpose::FinalBalance, at(1_700_000_000_123));
        let raw = reference.to_string();
        assert_eq!(raw, "17_FINAL_1700000000123");
        assert_eq!(PaymentReference::parse(&raw), Some(reference));
    }

    #[test]
    fn test_reference_parse_rejects_garbage() {
        assert!(PaymentReference::parse("abc_DEPOSIT_1").is_none());
        assert!(PaymentReference::parse("1_REFUND_1").is_none());
        assert!(PaymentReference::parse("1_DEPOSIT").is_none());
        assert!(PaymentReference::parse("").is_none());
    }

    #[test]
    fn test_reset_mints_new_reference_and_clears_callback_fields() {
        let now = at(1_000);
        let mut session = PaymentSession::new(5, PaymentPurpose::Deposit, 300, now);
        session.mark_failed(
            SettlementDetails {
                external_transaction_id: Some("T1".into()),
                bank_code: Some("NCB".into()),
                response_code: "24".into(),
            },
            now,
        );
        let first = session.reference.clone();
        let id = session.id;

        session.reset(300, now);

        assert_eq!(session.id, id);
        assert_ne!(session.reference, first);
        assert_eq!(session.superseded_references, vec![first]);
        assert_eq!(session.state, SessionState::Pending);
        assert!(session.external_transaction_id.is_none());
        assert!(session.bank_code.is_none());
        assert!(session.response_code.is_none());
    }

    #[test]
    fn test_reset_within_same_millisecond_stays_unique() {
        let now = at(2_000);
        let mut session = PaymentSession::new(5, PaymentPurpose::Deposit, 300, now);
        session.reset(300, now);
        session.reset(300, now);

        let mut all = session.superseded_references.clone();
        all.push(session.reference.clone());
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_fractions_sum_to_one() {
        assert_eq!(
            PaymentPurpose::Deposit.fraction() + PaymentPurpose::FinalBalance.fraction(),
            Decimal::ONE
        );
    }
}
