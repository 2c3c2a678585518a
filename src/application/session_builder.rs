use crate::application::locks::{KeyedLocks, session_lock_key};
use crate::application::signature::{SignatureEngine, canonicalize};
use crate::config::{GatewayConfig, Payer};
use crate::domain::amount::{OrderTotal, deposit_amount, final_balance_amount};
use crate::domain::gateway::{DATE_FORMAT, PaymentRequestParams, SECURE_HASH};
use crate::domain::ports::{SharedClock, SharedOrderStore, SharedSessionStore};
use crate::domain::session::{PaymentPurpose, PaymentSession};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A caller's request to pay one purpose of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order_id: u64,
    pub purpose: PaymentPurpose,
    pub payer: Payer,
    pub client_ip: String,
    pub bank_code: Option<String>,
    pub locale: Option<String>,
}

impl PaymentRequest {
    pub fn new(order_id: u64, purpose: PaymentPurpose, payer: Payer, client_ip: impl Into<String>) -> Self {
        Self {
            order_id,
            purpose,
            payer,
            client_ip: client_ip.into(),
            bank_code: None,
            locale: None,
        }
    }

    pub fn with_bank_code(mut self, bank_code: impl Into<String>) -> Self {
        self.bank_code = Some(bank_code.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// Where to send the browser, and the ledger entry it pays.
#[derive(Debug, Clone)]
pub struct PaymentRedirect {
    pub url: String,
    pub session: PaymentSession,
}

/// Creates or resets the ledger entry for a payment and signs the redirect.
pub struct SessionBuilder {
    config: Arc<GatewayConfig>,
    signer: SignatureEngine,
    sessions: SharedSessionStore,
    orders: SharedOrderStore,
    clock: SharedClock,
    locks: KeyedLocks,
}

impl SessionBuilder {
    pub fn new(
        config: Arc<GatewayConfig>,
        signer: SignatureEngine,
        sessions: SharedSessionStore,
        orders: SharedOrderStore,
        clock: SharedClock,
        locks: KeyedLocks,
    ) -> Self {
        Self {
            config,
            signer,
            sessions,
            orders,
            clock,
            locks,
        }
    }

    /// Returns the signed redirect URL and the session it pays.
    ///
    /// An existing PENDING or FAILED session for the same (order, purpose) is
    /// reset under a new reference; a PAID one is never touched.
    pub async fn create_or_reset_session(&self, request: PaymentRequest) -> Result<PaymentRedirect> {
        let (order_id, purpose) = (request.order_id, request.purpose);
        self.build(request).await.inspect_err(|e| {
            if e.is_operational_alert() {
                error!(
                    order_id,
                    purpose = %purpose,
                    error = %e,
                    alert = true,
                    "payment session could not be prepared"
                );
            }
        })
    }

    async fn build(&self, request: PaymentRequest) -> Result<PaymentRedirect> {
        if request.client_ip.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "Client IP must not be empty".to_string(),
            ));
        }

        let order = self
            .orders
            .get(request.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(request.order_id))?;
        let total = OrderTotal::new(order.total)?;

        let _guard = self
            .locks
            .lock(&session_lock_key(order.id, request.purpose))
            .await;

        let paid_deposit = match request.purpose {
            PaymentPurpose::Deposit => None,
            PaymentPurpose::FinalBalance => Some(
                self.sessions
                    .current(order.id, PaymentPurpose::Deposit)
                    .await?
                    .filter(PaymentSession::is_paid)
                    .ok_or(PaymentError::InvalidPaymentSequence { order_id: order.id })?,
            ),
        };

        let existing = self.sessions.current(order.id, request.purpose).await?;
        if existing.as_ref().is_some_and(PaymentSession::is_paid) {
            return Err(PaymentError::AlreadyPaid {
                order_id: order.id,
                purpose: request.purpose,
            });
        }

        let amount = match &paid_deposit {
            None => deposit_amount(total)?,
            Some(deposit) => final_balance_amount(total, deposit.amount)?,
        };
        if amount <= 0 {
            return Err(PaymentError::ValidationError(format!(
                "Order {} total {} yields no {} amount",
                order.id, order.total, request.purpose
            )));
        }

        let now = self.clock.now();
        let session = match existing {
            Some(mut existing) => {
                debug!(
                    order_id = order.id,
                    previous = %existing.reference,
                    "resetting payment session"
                );
                existing.reset(amount, now);
                existing
            }
            None => PaymentSession::new(order.id, request.purpose, amount, now),
        };
        let params = self.request_params(&request, &session)?;
        self.sessions.store(session.clone()).await?;
        let url = self.signed_url(&params);

        info!(
            order_id = order.id,
            purpose = %request.purpose,
            reference = %session.reference,
            amount = session.amount,
            "payment session ready"
        );
        Ok(PaymentRedirect { url, session })
    }

    fn request_params(
        &self,
        request: &PaymentRequest,
        session: &PaymentSession,
    ) -> Result<PaymentRequestParams> {
        let offset = FixedOffset::east_opt(self.config.utc_offset_hours * 3600).ok_or_else(|| {
            PaymentError::ConfigError("utc_offset_hours is out of range".to_string())
        })?;
        let gateway_time = |at: DateTime<Utc>| at.with_timezone(&offset).format(DATE_FORMAT).to_string();
        let created = session.created_at;
        let expires = created + Duration::minutes(self.config.expiry_minutes);

        let amount = session
            .amount
            .checked_mul(self.config.amount_multiplier)
            .ok_or_else(|| PaymentError::ValidationError("Amount out of range".to_string()))?;

        Ok(PaymentRequestParams {
            version: self.config.version.clone(),
            command: "pay".to_string(),
            merchant_code: self.config.merchant_code.clone(),
            amount,
            currency: self.config.currency.clone(),
            reference: session.reference.clone(),
            order_info: format!("Payment of {} for order {}", session.purpose, session.order_id),
            order_type: self.config.order_type.clone(),
            bank_code: request
                .bank_code
                .clone()
                .filter(|code| !code.trim().is_empty()),
            locale: request
                .locale
                .clone()
                .unwrap_or_else(|| self.config.locale.clone()),
            return_url: self
                .config
                .return_urls
                .select(request.payer, session.purpose)
                .to_string(),
            client_ip: request.client_ip.clone(),
            create_date: gateway_time(created),
            expire_date: gateway_time(expires),
        })
    }

    fn signed_url(&self, params: &PaymentRequestParams) -> String {
        let canonical = canonicalize(params.to_params());
        let signature = self.signer.sign(&canonical);
        let separator = if self.config.base_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{}{}&{}={}",
            self.config.base_url, separator, canonical, SECURE_HASH, signature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::domain::order::Order;
    use crate::domain::ports::{OrderStore, SessionStore};
    use crate::domain::session::SessionState;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::in_memory::{InMemoryOrderStore, InMemorySessionStore};
    use crate::interfaces::query::parse_params;
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Ledger that reads as empty and refuses every write.
    struct UnwritableLedger;

    #[async_trait]
    impl SessionStore for UnwritableLedger {
        async fn store(&self, _session: PaymentSession) -> Result<()> {
            Err(PaymentError::store("ledger is read-only"))
        }
        async fn get_by_reference(&self, _reference: &str) -> Result<Option<PaymentSession>> {
            Ok(None)
        }
        async fn was_issued(&self, _reference: &str) -> Result<bool> {
            Ok(false)
        }
        async fn current(
            &self,
            _order_id: u64,
            _purpose: PaymentPurpose,
        ) -> Result<Option<PaymentSession>> {
            Ok(None)
        }
        async fn get_all(&self) -> Result<Vec<PaymentSession>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        builder: SessionBuilder,
        sessions: Arc<InMemorySessionStore>,
        clock: Arc<FixedClock>,
    }

    async fn fixture() -> Fixture {
        let sessions = Arc::new(InMemorySessionStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        orders.store(Order::new(1, 10_000_000, 100)).await.unwrap();
        orders.store(Order::new(2, 15, 200)).await.unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap(),
        ));
        let config = test_config();
        let signer = SignatureEngine::new(&config.secret).unwrap();
        let builder = SessionBuilder::new(
            Arc::new(config),
            signer,
            sessions.clone(),
            orders,
            clock.clone(),
            KeyedLocks::new(),
        );
        Fixture {
            builder,
            sessions,
            clock,
        }
    }

    #[tokio::test]
    async fn test_deposit_url_carries_signed_parameters() {
        let f = fixture().await;
        let redirect = f
            .builder
            .create_or_reset_session(
                PaymentRequest::new(1, PaymentPurpose::Deposit, Payer::Customer, "10.0.0.1")
                    .with_bank_code("NCB"),
            )
            .await
            .unwrap();

        assert_eq!(redirect.session.amount, 3_000_000);
        assert!(
            redirect
                .url
                .starts_with("https://sandbox.gateway.test/paymentv2/vpcpay.html?")
        );

        let query = redirect.url.split_once('?').unwrap().1;
        let params = parse_params(query);
        assert_eq!(params["vnp_Amount"], "300000000");
        assert_eq!(params["vnp_TxnRef"], redirect.session.reference);
        assert_eq!(params["vnp_BankCode"], "NCB");
        assert_eq!(params["vnp_ReturnUrl"], "https://shop.test/customer/deposit");
        // 02:00 UTC is 09:00 at UTC+7.
        assert_eq!(params["vnp_CreateDate"], "20240301090000");
        assert_eq!(params["vnp_ExpireDate"], "20240301091500");

        let signer = SignatureEngine::new(test_config().secret).unwrap();
        assert!(signer.verify(&params, &params["vnp_SecureHash"]));
    }

    #[tokio::test]
    async fn test_staff_flow_uses_staff_return_url() {
        let f = fixture().await;
        let redirect = f
            .builder
            .create_or_reset_session(PaymentRequest::new(
                1,
                PaymentPurpose::Deposit,
                Payer::DealerStaff,
                "10.0.0.1",
            ))
            .await
            .unwrap();
        let params = parse_params(redirect.url.split_once('?').unwrap().1);
        assert_eq!(params["vnp_ReturnUrl"], "https://shop.test/staff/deposit");
        assert!(!params.contains_key("vnp_BankCode"));
    }

    #[tokio::test]
    async fn test_retry_resets_single_row() {
        let f = fixture().await;
        let request = PaymentRequest::new(1, PaymentPurpose::Deposit, Payer::Customer, "10.0.0.1");

        let first = f.builder.create_or_reset_session(request.clone()).await.unwrap();
        f.clock.advance(Duration::seconds(30));
        let second = f.builder.create_or_reset_session(request).await.unwrap();

        assert_ne!(first.session.reference, second.session.reference);
        assert_eq!(first.session.id, second.session.id);
        assert_eq!(second.session.state, SessionState::Pending);
        assert_eq!(f.sessions.get_all().await.unwrap().len(), 1);
        assert!(
            f.sessions
                .get_by_reference(&first.session.reference)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_final_balance_requires_paid_deposit() {
        let f = fixture().await;
        let final_request =
            PaymentRequest::new(1, PaymentPurpose::FinalBalance, Payer::Customer, "10.0.0.1");

        let err = f
            .builder
            .create_or_reset_session(final_request.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPaymentSequence { order_id: 1 }));

        // A pending deposit is not enough.
        f.builder
            .create_or_reset_session(PaymentRequest::new(
                1,
                PaymentPurpose::Deposit,
                Payer::Customer,
                "10.0.0.1",
            ))
            .await
            .unwrap();
        let err = f
            .builder
            .create_or_reset_session(final_request)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPaymentSequence { .. }));
    }

    #[tokio::test]
    async fn test_paid_session_is_immutable() {
        let f = fixture().await;
        let request = PaymentRequest::new(1, PaymentPurpose::Deposit, Payer::Customer, "10.0.0.1");
        let redirect = f.builder.create_or_reset_session(request.clone()).await.unwrap();

        let mut paid = redirect.session.clone();
        paid.state = SessionState::Paid;
        f.sessions.store(paid.clone()).await.unwrap();

        let err = f.builder.create_or_reset_session(request).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::AlreadyPaid {
                order_id: 1,
                purpose: PaymentPurpose::Deposit
            }
        ));
        let stored = f.sessions.current(1, PaymentPurpose::Deposit).await.unwrap().unwrap();
        assert_eq!(stored, paid);
    }

    #[tokio::test]
    async fn test_final_balance_covers_remainder_of_uneven_total() {
        let f = fixture().await;
        let deposit = f
            .builder
            .create_or_reset_session(PaymentRequest::new(
                2,
                PaymentPurpose::Deposit,
                Payer::Customer,
                "10.0.0.1",
            ))
            .await
            .unwrap();
        assert_eq!(deposit.session.amount, 5);

        let mut paid = deposit.session;
        paid.state = SessionState::Paid;
        f.sessions.store(paid).await.unwrap();

        let balance = f
            .builder
            .create_or_reset_session(PaymentRequest::new(
                2,
                PaymentPurpose::FinalBalance,
                Payer::Customer,
                "10.0.0.1",
            ))
            .await
            .unwrap();
        assert_eq!(balance.session.amount, 10);
        let params = parse_params(balance.url.split_once('?').unwrap().1);
        assert_eq!(params["vnp_ReturnUrl"], "https://shop.test/customer/final");
    }

    #[tokio::test]
    async fn test_ledger_write_failure_surfaces_as_store_failure() {
        let orders = Arc::new(InMemoryOrderStore::new());
        orders.store(Order::new(1, 10_000_000, 100)).await.unwrap();
        let config = test_config();
        let signer = SignatureEngine::new(&config.secret).unwrap();
        let builder = SessionBuilder::new(
            Arc::new(config),
            signer,
            Arc::new(UnwritableLedger),
            orders,
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap())),
            KeyedLocks::new(),
        );

        let err = builder
            .create_or_reset_session(PaymentRequest::new(
                1,
                PaymentPurpose::Deposit,
                Payer::Customer,
                "10.0.0.1",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::UnderlyingStoreFailure(_)));
        assert!(err.is_operational_alert());
    }

    #[tokio::test]
    async fn test_unknown_order_and_blank_ip() {
        let f = fixture().await;
        let err = f
            .builder
            .create_or_reset_session(PaymentRequest::new(
                99,
                PaymentPurpose::Deposit,
                Payer::Customer,
                "10.0.0.1",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound(99)));

        let err = f
            .builder
            .create_or_reset_session(PaymentRequest::new(1, PaymentPurpose::Deposit, Payer::Customer, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::ValidationError(_)));
        assert!(f.sessions.get_all().await.unwrap().is_empty());
    }
}
