use thiserror::Error;

/// Errors surfaced synchronously by ledger operations.
///
/// Validation rejections never mutate state; callers get the reason and the
/// amounts already reserved by other open orders so they can surface a
/// meaningful message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient cash: required {required:.2}, available {available:.2} ({reserved:.2} reserved by open orders)")]
    InsufficientCash {
        required: f64,
        available: f64,
        reserved: f64,
    },

    #[error("Insufficient shares of {symbol}: requested {requested}, available {available} ({reserved} reserved by open orders)")]
    InsufficientShares {
        symbol: String,
        requested: f64,
        available: f64,
        reserved: f64,
    },

    #[error("Duplicate order: open {kind} order {existing_id} for {symbol} already has trigger {existing_trigger:.2}")]
    DuplicateOrder {
        symbol: String,
        kind: String,
        existing_id: String,
        existing_trigger: f64,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Invalid order state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Autopilot cycle already in progress")]
    CycleInProgress,
}

/// Errors reported by the quote collaborator boundary.
#[derive(Debug, Error, Clone)]
pub enum QuoteError {
    #[error("Quote request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed quote payload: {0}")]
    MalformedPayload(String),
}

/// Errors reported by the recommendation collaborator boundary.
#[derive(Debug, Error, Clone)]
pub enum AdvisorError {
    #[error("Recommendation request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed recommendation payload: {0}")]
    MalformedPayload(String),
}

/// Errors reported by the notification sink. Never blocks ledger state.
#[derive(Debug, Error, Clone)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Failure importing a persisted account document.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Malformed account document: {0}")]
    Malformed(String),

    #[error("I/O error reading account document: {0}")]
    Io(#[from] std::io::Error),
}

impl From<String> for LedgerError {
    fn from(msg: String) -> Self {
        LedgerError::InvalidInput(msg)
    }
}
