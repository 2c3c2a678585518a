use crate::application::effects::{DeliveryReport, EffectHandler};
use crate::application::locks::KeyedLocks;
use crate::application::reconciliation::{ReconciliationProcessor, ReconciliationResult};
use crate::application::session_builder::{PaymentRedirect, PaymentRequest, SessionBuilder};
use crate::application::signature::SignatureEngine;
use crate::config::GatewayConfig;
use crate::domain::ports::{
    SharedAlertSink, SharedClock, SharedOrderStore, SharedProductStore, SharedSessionStore,
};
use crate::error::Result;
use std::sync::Arc;

/// The storage backends the engine works against.
#[derive(Clone)]
pub struct Stores {
    pub sessions: SharedSessionStore,
    pub orders: SharedOrderStore,
    pub products: SharedProductStore,
}

/// The main entry point of the payment subsystem.
///
/// `PaymentEngine` wires the session builder, the reconciliation processor and
/// the effect handler over one set of stores and one lock registry, so the
/// per-session and per-vehicle critical sections hold across all of them.
pub struct PaymentEngine {
    builder: SessionBuilder,
    processor: ReconciliationProcessor,
    effects: Arc<EffectHandler>,
}

impl PaymentEngine {
    /// Creates a new `PaymentEngine`.
    ///
    /// # Arguments
    ///
    /// * `config` - Gateway settings, including the shared signing secret.
    /// * `stores` - Ledger, order and product stores.
    /// * `alerts` - Where operator alerts are raised.
    /// * `clock` - Source of the current time.
    ///
    /// Fails with `ConfigError` when the secret cannot key the signer.
    pub fn new(
        config: GatewayConfig,
        stores: Stores,
        alerts: SharedAlertSink,
        clock: SharedClock,
    ) -> Result<Self> {
        let signer = SignatureEngine::new(&config.secret)?;
        let config = Arc::new(config);
        let locks = KeyedLocks::new();
        let effects = Arc::new(EffectHandler::new(
            stores.orders.clone(),
            stores.products.clone(),
            alerts.clone(),
            locks.clone(),
        ));
        let processor = ReconciliationProcessor::new(
            signer.clone(),
            stores.sessions.clone(),
            effects.clone(),
            alerts,
            clock.clone(),
            locks.clone(),
        );
        let builder = SessionBuilder::new(
            config,
            signer,
            stores.sessions,
            stores.orders,
            clock,
            locks,
        );
        Ok(Self {
            builder,
            processor,
            effects,
        })
    }

    pub async fn create_or_reset_session(&self, request: PaymentRequest) -> Result<PaymentRedirect> {
        self.builder.create_or_reset_session(request).await
    }

    pub async fn handle_callback<I, K, V>(&self, raw: I) -> Result<ReconciliationResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.processor.handle_callback(raw).await
    }

    pub async fn confirm_delivery(&self, order_id: u64) -> Result<DeliveryReport> {
        self.effects.confirm_delivery(order_id).await
    }
}
