//! The exported/imported account document.

use crate::domain::entities::alert::PriceAlert;
use crate::domain::entities::autopilot::{AutopilotLogEntry, AutopilotSettings, AutopilotState};
use crate::domain::entities::order::Order;
use crate::domain::entities::position::Position;
use crate::domain::entities::settings::OrderSettings;
use crate::domain::entities::signal::Signal;
use crate::domain::errors::ImportError;
use crate::domain::services::admission::AdmissionPolicy;
use crate::domain::services::ledger::{AnalysisEntry, Ledger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// General account settings under the `settings` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSettings {
    pub currency: String,
    pub duplicate_tolerance_percent: f64,
}

/// Serialized account state. Every field is optional: an absent key is
/// skipped on import, leaving that part of the ledger untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<AccountSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<Position>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchlist: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<Vec<Signal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_settings: Option<OrderSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_alerts: Option<Vec<PriceAlert>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analysis_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_history: Option<Vec<AnalysisEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autopilot_settings: Option<AutopilotSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autopilot_state: Option<AutopilotState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autopilot_log: Option<Vec<AutopilotLogEntry>>,
}

impl AccountDocument {
    /// Capture the full ledger state; every key present.
    pub fn export(ledger: &Ledger) -> Self {
        AccountDocument {
            settings: Some(AccountSettings {
                currency: ledger.default_currency.clone(),
                duplicate_tolerance_percent: ledger.admission.duplicate_tolerance_percent,
            }),
            positions: Some(ledger.positions.values().cloned().collect()),
            watchlist: Some(ledger.watchlist.clone()),
            cash_balance: Some(ledger.cash_balance),
            initial_capital: Some(ledger.initial_capital),
            prior_profit: Some(ledger.prior_profit),
            signals: Some(ledger.signals.clone()),
            orders: Some(ledger.orders.clone()),
            order_settings: Some(ledger.order_settings.clone()),
            price_alerts: Some(ledger.alerts.clone()),
            last_analysis: ledger.last_analysis.clone(),
            last_analysis_at: ledger.last_analysis_at,
            analysis_history: Some(ledger.analysis_history.iter().cloned().collect()),
            autopilot_settings: Some(ledger.autopilot_settings.clone()),
            autopilot_state: Some(ledger.autopilot_state.clone()),
            autopilot_log: Some(ledger.autopilot_log.iter().cloned().collect()),
        }
    }

    /// Parse a document; malformed top-level structure is a single failure
    /// and nothing is applied.
    pub fn parse(json: &str) -> Result<Self, ImportError> {
        serde_json::from_str(json).map_err(|e| ImportError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Apply every present key to the ledger. Absent keys leave the existing
    /// state alone; id generation is reseeded afterwards so fresh ids never
    /// collide with restored ones.
    pub fn apply(self, ledger: &mut Ledger) {
        if let Some(settings) = self.settings {
            ledger.default_currency = settings.currency;
            ledger.admission = AdmissionPolicy {
                duplicate_tolerance_percent: settings.duplicate_tolerance_percent,
            };
        }
        if let Some(positions) = self.positions {
            ledger.positions = positions
                .into_iter()
                .map(|p| (p.symbol.clone(), p))
                .collect();
        }
        if let Some(watchlist) = self.watchlist {
            ledger.watchlist = watchlist;
        }
        if let Some(cash) = self.cash_balance {
            ledger.cash_balance = cash;
        }
        if let Some(capital) = self.initial_capital {
            ledger.initial_capital = capital;
        }
        if let Some(profit) = self.prior_profit {
            ledger.prior_profit = profit;
        }
        if let Some(signals) = self.signals {
            ledger.signals = signals;
        }
        if let Some(orders) = self.orders {
            ledger.orders = orders;
        }
        if let Some(settings) = self.order_settings {
            ledger.order_settings = settings;
        }
        if let Some(alerts) = self.price_alerts {
            ledger.alerts = alerts;
        }
        if let Some(text) = self.last_analysis {
            ledger.last_analysis = Some(text);
        }
        if let Some(at) = self.last_analysis_at {
            ledger.last_analysis_at = Some(at);
        }
        if let Some(history) = self.analysis_history {
            ledger.analysis_history = history.into_iter().collect();
        }
        if let Some(settings) = self.autopilot_settings {
            ledger.autopilot_settings = settings;
        }
        if let Some(state) = self.autopilot_state {
            ledger.autopilot_state = state;
        }
        if let Some(log) = self.autopilot_log {
            ledger.autopilot_log = log.into_iter().collect();
        }
        ledger.reseed_id_counter();
    }
}
