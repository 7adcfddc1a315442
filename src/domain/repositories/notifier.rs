//! Notification Sink Trait
//!
//! Fire-and-forget delivery of account events. Failures are logged by the
//! caller and never block or roll back ledger state.

use crate::domain::errors::NotifyError;
use async_trait::async_trait;

pub type NotifyResult = Result<(), NotifyError>;

/// An event worth telling the account owner about.
#[derive(Debug, Clone)]
pub enum AccountEvent {
    OrderExecuted {
        order_id: String,
        symbol: String,
        message: String,
    },
    OrderCancelled {
        order_id: String,
        symbol: String,
        reason: String,
    },
    AlertTriggered {
        alert_id: String,
        symbol: String,
        price: f64,
    },
    AutopilotDecision {
        message: String,
    },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: AccountEvent) -> NotifyResult;
}

/// Sink that drops every event; the default when no channel is configured.
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn notify(&self, _event: AccountEvent) -> NotifyResult {
        Ok(())
    }
}
