//! Advisor output types: signals and suggested orders.

use crate::domain::entities::order::OrderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One advisor signal for a symbol. Confidence is on a 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub direction: TradeDirection,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    pub risk: RiskLevel,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

/// A concrete order proposal inside a recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedOrder {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub kind: OrderKind,
    pub quantity: f64,
    pub trigger_price: f64,
    pub reasoning: String,
    pub confidence: f64,
}

/// Complete advisor response for one autopilot cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub suggested_orders: Vec<SuggestedOrder>,
    /// Free-text market analysis, kept in the account's analysis history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}
