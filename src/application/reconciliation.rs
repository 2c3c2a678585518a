use crate::application::effects::EffectHandler;
use crate::application::locks::{KeyedLocks, session_lock_key};
use crate::application::signature::SignatureEngine;
use crate::domain::alert::OperatorAlert;
use crate::domain::gateway::CallbackParams;
use crate::domain::ports::{SharedAlertSink, SharedClock, SharedSessionStore};
use crate::domain::session::{PaymentReference, SessionState, SettlementDetails};
use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a callback was processed.
///
/// `Failed` means the callback was handled correctly and the *payment* failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationResult {
    Success,
    Failed,
    InvalidSignature,
    SessionNotFound,
}

/// Body the gateway expects in reply to a server-to-server notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl ReconciliationResult {
    pub fn acknowledgement(&self) -> GatewayAck {
        let (rsp_code, message) = match self {
            ReconciliationResult::Success | ReconciliationResult::Failed => ("00", "Confirm Success"),
            ReconciliationResult::InvalidSignature => ("97", "Invalid Checksum"),
            ReconciliationResult::SessionNotFound => ("01", "Order not Found"),
        };
        GatewayAck { rsp_code, message }
    }
}

/// Verifies gateway callbacks and settles the matching ledger entry.
pub struct ReconciliationProcessor {
    signer: SignatureEngine,
    sessions: SharedSessionStore,
    effects: Arc<EffectHandler>,
    alerts: SharedAlertSink,
    clock: SharedClock,
    locks: KeyedLocks,
}

impl ReconciliationProcessor {
    pub fn new(
        signer: SignatureEngine,
        sessions: SharedSessionStore,
        effects: Arc<EffectHandler>,
        alerts: SharedAlertSink,
        clock: SharedClock,
        locks: KeyedLocks,
    ) -> Self {
        Self {
            signer,
            sessions,
            effects,
            alerts,
            clock,
            locks,
        }
    }

    /// Processes one callback.
    ///
    /// Only store failures come back as `Err`; every other outcome is a
    /// `ReconciliationResult`. Replays of a settled reference are no-ops that
    /// report the stored outcome again.
    pub async fn handle_callback<I, K, V>(&self, raw: I) -> Result<ReconciliationResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let callback = CallbackParams::from_params(raw);

        let error = match self.reconcile(&callback).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        if error.is_operational_alert() {
            error!(
                reference = ?callback.reference,
                error = %error,
                alert = true,
                "callback rejected"
            );
        }
        match error {
            PaymentError::InvalidSignature => {
                self.alerts
                    .raise(OperatorAlert::InvalidSignature {
                        reference: callback.reference.clone(),
                    })
                    .await;
                Ok(ReconciliationResult::InvalidSignature)
            }
            PaymentError::SessionNotFound(_) => Ok(ReconciliationResult::SessionNotFound),
            other => Err(other),
        }
    }

    async fn reconcile(&self, callback: &CallbackParams) -> Result<ReconciliationResult> {
        let signature_ok = callback
            .secure_hash
            .as_deref()
            .is_some_and(|hash| self.signer.verify(callback.signed_fields(), hash));
        if !signature_ok {
            return Err(PaymentError::InvalidSignature);
        }

        let Some(reference) = callback.reference.as_deref() else {
            warn!("signed callback carries no reference");
            return Err(PaymentError::SessionNotFound(String::new()));
        };
        let Some(parsed) = PaymentReference::parse(reference) else {
            warn!(reference, "callback reference is not one we issue");
            return Err(PaymentError::SessionNotFound(reference.to_string()));
        };
        let order_id = parsed.order_id;

        // Same key the session builder holds while resetting this row.
        let _guard = self
            .locks
            .lock(&session_lock_key(order_id, parsed.purpose))
            .await;

        let mut session = match self.sessions.get_by_reference(reference).await? {
            Some(session) if session.order_id == order_id && session.purpose == parsed.purpose => {
                session
            }
            Some(_) | None => {
                if self.sessions.was_issued(reference).await? {
                    warn!(reference, order_id, "callback for a superseded payment attempt");
                    self.alerts
                        .raise(OperatorAlert::StaleCallback {
                            reference: reference.to_string(),
                        })
                        .await;
                } else {
                    warn!(reference, order_id, "callback for unknown reference");
                }
                return Err(PaymentError::SessionNotFound(reference.to_string()));
            }
        };

        match session.state {
            SessionState::Paid => {
                info!(reference, "duplicate callback for a paid session");
                return Ok(ReconciliationResult::Success);
            }
            SessionState::Failed => {
                info!(reference, "duplicate callback for a failed session");
                return Ok(ReconciliationResult::Failed);
            }
            SessionState::Pending => {}
        }

        let details = SettlementDetails {
            external_transaction_id: callback.transaction_no.clone(),
            bank_code: callback.bank_code.clone(),
            response_code: callback.response_code.clone().unwrap_or_default(),
        };
        let now = self.clock.now();

        if !callback.reports_success() {
            session.mark_failed(details, now);
            self.sessions.store(session.clone()).await?;
            info!(
                reference,
                order_id,
                response_code = ?session.response_code,
                "payment failed"
            );
            return Ok(ReconciliationResult::Failed);
        }

        session.mark_paid(details, now);
        self.sessions.store(session.clone()).await?;
        info!(
            reference,
            order_id,
            purpose = %session.purpose,
            transaction = ?session.external_transaction_id,
            "payment settled"
        );

        // The ledger write above is the unit of truth; effects are best-effort.
        if let Err(e) = self.effects.apply_payment(&session).await {
            if e.is_operational_alert() {
                error!(reference, error = %e, alert = true, "payment effects failed");
            } else {
                warn!(reference, error = %e, alert = true, "payment effects refused");
            }
            self.alerts
                .raise(OperatorAlert::EffectFailure {
                    reference: reference.to_string(),
                    reason: e.to_string(),
                })
                .await;
        }
        Ok(ReconciliationResult::Success)
    }
}
