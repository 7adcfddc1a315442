//! Conditional order entity and its lifecycle state machine.

use crate::domain::errors::LedgerError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four supported conditional order kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderKind {
    /// Buy when the market falls to or below the trigger.
    LimitBuy,
    /// Sell when the market rises to or above the trigger.
    LimitSell,
    /// Protective sell when the market falls to or below the trigger.
    StopLoss,
    /// Buy on breakout when the market rises to or above the trigger.
    StopBuy,
}

impl OrderKind {
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderKind::LimitBuy | OrderKind::StopBuy)
    }

    pub fn is_sell(&self) -> bool {
        !self.is_buy()
    }

    /// Price-trigger predicate: does an order of this kind with trigger `t`
    /// become eligible at market price `p`? Boundaries are inclusive.
    pub fn triggers_at(&self, p: f64, t: f64) -> bool {
        match self {
            OrderKind::LimitBuy | OrderKind::StopLoss => p <= t,
            OrderKind::LimitSell | OrderKind::StopBuy => p >= t,
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::LimitBuy => write!(f, "limit-buy"),
            OrderKind::LimitSell => write!(f, "limit-sell"),
            OrderKind::StopLoss => write!(f, "stop-loss"),
            OrderKind::StopBuy => write!(f, "stop-buy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Awaiting confirmation (autopilot confirm-each creations start here).
    Pending,
    /// Eligible for trigger evaluation.
    Active,
    Executed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    /// Open orders reserve cash or shares and may still transition.
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Active => write!(f, "active"),
            OrderStatus::Executed => write!(f, "executed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Who created the order. The autopilot may only replace its own orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderOrigin {
    Manual,
    Autopilot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub kind: OrderKind,
    pub quantity: f64,
    pub trigger_price: f64,
    /// Last observed market price for the symbol.
    pub current_price: f64,
    pub status: OrderStatus,
    pub origin: OrderOrigin,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        symbol: String,
        name: String,
        kind: OrderKind,
        quantity: f64,
        trigger_price: f64,
        current_price: f64,
        status: OrderStatus,
        origin: OrderOrigin,
    ) -> Result<Self, LedgerError> {
        let quantity = Quantity::positive(quantity)?.value();
        let trigger_price = Price::positive(trigger_price)?.value();
        let current_price = Price::new(current_price)?.value();
        if symbol.is_empty() {
            return Err(LedgerError::InvalidInput("Symbol must not be empty".to_string()));
        }
        if !matches!(status, OrderStatus::Pending | OrderStatus::Active) {
            return Err(LedgerError::InvalidInput(format!(
                "New orders must start pending or active, not {}",
                status
            )));
        }

        Ok(Order {
            id,
            symbol,
            name,
            kind,
            quantity,
            trigger_price,
            current_price,
            status,
            origin,
            created_at: Utc::now(),
            expires_at: None,
            executed_at: None,
            executed_price: None,
            note: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Whether the trigger condition is met at `market_price`. Callers decide
    /// whether the order is in a state that allows execution.
    pub fn should_trigger(&self, market_price: f64) -> bool {
        self.kind.triggers_at(market_price, self.trigger_price)
    }

    /// Pending -> Active. The only confirmation transition.
    pub fn confirm(&mut self) -> Result<(), LedgerError> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Active;
                Ok(())
            }
            other => Err(LedgerError::InvalidTransition {
                from: other.to_string(),
                to: OrderStatus::Active.to_string(),
            }),
        }
    }

    /// Cancel an open order, optionally annotating the reason.
    pub fn cancel(&mut self, reason: Option<&str>) -> Result<(), LedgerError> {
        if !self.is_open() {
            return Err(LedgerError::InvalidTransition {
                from: self.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }
        self.status = OrderStatus::Cancelled;
        if let Some(reason) = reason {
            self.append_note(reason);
        }
        Ok(())
    }

    /// Whether an active order has passed its expiry time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Active
            && self.expires_at.map(|at| now > at).unwrap_or(false)
    }

    pub fn expire(&mut self) {
        if self.status == OrderStatus::Active {
            self.status = OrderStatus::Expired;
        }
    }

    /// Terminal success transition; the only place executed fields are set.
    pub fn mark_executed(&mut self, executed_price: f64, at: DateTime<Utc>) {
        self.status = OrderStatus::Executed;
        self.executed_price = Some(executed_price);
        self.executed_at = Some(at);
    }

    pub fn append_note(&mut self, text: &str) {
        match &mut self.note {
            Some(note) => {
                note.push_str("; ");
                note.push_str(text);
            }
            None => self.note = Some(text.to_string()),
        }
    }
}
