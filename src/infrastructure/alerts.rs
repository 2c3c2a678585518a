use crate::domain::alert::OperatorAlert;
use crate::domain::ports::AlertSink;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

/// Reports alerts through the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn raise(&self, alert: OperatorAlert) {
        error!(alert = true, kind = ?alert, "{}", alert);
    }
}

/// Keeps alerts in memory, and logs them like `TracingAlertSink`.
#[derive(Default, Clone)]
pub struct CollectingAlertSink {
    alerts: Arc<RwLock<Vec<OperatorAlert>>>,
}

impl CollectingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<OperatorAlert> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for CollectingAlertSink {
    async fn raise(&self, alert: OperatorAlert) {
        TracingAlertSink.raise(alert.clone()).await;
        self.alerts.write().await.push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collecting_sink_keeps_order() {
        let sink = CollectingAlertSink::new();
        sink.raise(OperatorAlert::StaleCallback {
            reference: "1_DEPOSIT_1".into(),
        })
        .await;
        sink.raise(OperatorAlert::InvalidSignature { reference: None })
            .await;

        let alerts = sink.alerts().await;
        assert_eq!(alerts.len(), 2);
        assert!(matches!(alerts[1], OperatorAlert::InvalidSignature { .. }));
    }
}
