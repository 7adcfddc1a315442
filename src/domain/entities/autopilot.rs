//! Autopilot configuration, runtime state and the capped decision log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum retained log entries; the oldest entry is dropped beyond this.
pub const AUTOPILOT_LOG_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutopilotMode {
    /// Recommendations are logged only; no orders are created.
    SuggestOnly,
    /// Orders are created pending human confirmation.
    ConfirmEach,
    /// Orders are created directly active.
    FullAuto,
}

impl std::fmt::Display for AutopilotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutopilotMode::SuggestOnly => write!(f, "suggest-only"),
            AutopilotMode::ConfirmEach => write!(f, "confirm-each"),
            AutopilotMode::FullAuto => write!(f, "full-auto"),
        }
    }
}

/// Closed enumeration of trading permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Buy,
    Sell,
    NewPositions,
    WatchlistOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePermissions {
    pub allow_buy: bool,
    pub allow_sell: bool,
    /// Permit orders that would open a symbol not currently held.
    pub allow_new_positions: bool,
    /// Restrict suggestions to the watchlist and current holdings.
    pub watchlist_only: bool,
}

impl Default for TradePermissions {
    fn default() -> Self {
        TradePermissions {
            allow_buy: true,
            allow_sell: true,
            allow_new_positions: true,
            watchlist_only: false,
        }
    }
}

impl TradePermissions {
    pub fn allows(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::Buy => self.allow_buy,
            PermissionKind::Sell => self.allow_sell,
            PermissionKind::NewPositions => self.allow_new_positions,
            PermissionKind::WatchlistOnly => self.watchlist_only,
        }
    }

    pub fn set(&mut self, kind: PermissionKind, value: bool) {
        match kind {
            PermissionKind::Buy => self.allow_buy = value,
            PermissionKind::Sell => self.allow_sell = value,
            PermissionKind::NewPositions => self.allow_new_positions = value,
            PermissionKind::WatchlistOnly => self.watchlist_only = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotSettings {
    pub enabled: bool,
    pub mode: AutopilotMode,
    /// Interval between cycles.
    pub interval_secs: u64,
    /// Only run while one of the configured market windows is open.
    pub active_hours_only: bool,
    /// Hard cap on orders created in one cycle.
    pub max_trades_per_cycle: usize,
    /// Maximum position size as a percentage of total assets.
    pub max_position_percent: f64,
    /// Minimum available cash kept back, as a percentage of total assets.
    pub min_cash_reserve_percent: f64,
    /// Minimum suggestion confidence (0-100) to act on.
    pub min_confidence: f64,
    pub permissions: TradePermissions,
}

impl Default for AutopilotSettings {
    fn default() -> Self {
        AutopilotSettings {
            enabled: false,
            mode: AutopilotMode::ConfirmEach,
            interval_secs: 3600,
            active_hours_only: true,
            max_trades_per_cycle: 3,
            max_position_percent: 20.0,
            min_cash_reserve_percent: 10.0,
            min_confidence: 60.0,
            permissions: TradePermissions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotState {
    /// Re-entrancy guard: set before the first suspension point of a cycle,
    /// cleared on every exit path.
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub cycles_completed: u64,
    pub orders_created_total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Created,
    Skipped,
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl AutopilotLogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        AutopilotLogEntry {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            symbol: None,
            order_id: None,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }
}

/// Append an entry, dropping the oldest beyond [`AUTOPILOT_LOG_CAP`].
pub fn push_log_entry(log: &mut VecDeque<AutopilotLogEntry>, entry: AutopilotLogEntry) {
    if log.len() >= AUTOPILOT_LOG_CAP {
        log.pop_front();
    }
    log.push_back(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_closed_enum() {
        let mut perms = TradePermissions::default();
        assert!(perms.allows(PermissionKind::Buy));
        perms.set(PermissionKind::Buy, false);
        assert!(!perms.allows(PermissionKind::Buy));
        perms.set(PermissionKind::WatchlistOnly, true);
        assert!(perms.allows(PermissionKind::WatchlistOnly));
    }

    #[test]
    fn test_mode_wire_format() {
        assert_eq!(
            serde_json::to_string(&AutopilotMode::SuggestOnly).unwrap(),
            "\"suggest-only\""
        );
        let parsed: AutopilotMode = serde_json::from_str("\"full-auto\"").unwrap();
        assert_eq!(parsed, AutopilotMode::FullAuto);
    }

    #[test]
    fn test_log_cap_drops_oldest() {
        let mut log = VecDeque::new();
        for i in 0..(AUTOPILOT_LOG_CAP + 10) {
            push_log_entry(
                &mut log,
                AutopilotLogEntry::new(LogKind::Info, format!("entry {}", i)),
            );
        }
        assert_eq!(log.len(), AUTOPILOT_LOG_CAP);
        assert_eq!(log.front().unwrap().message, "entry 10");
        assert_eq!(
            log.back().unwrap().message,
            format!("entry {}", AUTOPILOT_LOG_CAP + 9)
        );
    }

    #[test]
    fn test_log_entry_builder() {
        let entry = AutopilotLogEntry::new(LogKind::Created, "order created")
            .with_symbol("AAPL")
            .with_order_id("ord_7");
        assert_eq!(entry.kind, LogKind::Created);
        assert_eq!(entry.symbol.as_deref(), Some("AAPL"));
        assert_eq!(entry.order_id.as_deref(), Some("ord_7"));
    }
}
