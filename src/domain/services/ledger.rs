//! Ledger - single owner of cash, positions, orders and account bookkeeping.
//!
//! Every mutation of account state goes through a method on [`Ledger`]; the
//! application layer serializes access behind one lock so no operation can
//! observe a half-updated ledger. Derived views (reserved cash, reserved
//! quantity, portfolio value) are pure functions over current state,
//! recomputed on demand.

use crate::domain::entities::alert::PriceAlert;
use crate::domain::entities::autopilot::{
    push_log_entry, AutopilotLogEntry, AutopilotSettings, AutopilotState,
};
use crate::domain::entities::order::{Order, OrderKind, OrderOrigin, OrderStatus};
use crate::domain::entities::position::Position;
use crate::domain::entities::settings::OrderSettings;
use crate::domain::entities::signal::Signal;
use crate::domain::errors::LedgerError;
use crate::domain::services::admission::AdmissionPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Retained analysis history entries (most recent first dropped last).
pub const ANALYSIS_HISTORY_CAP: usize = 5;

/// Retained advisor signals; older ones roll off as new cycles record more.
pub const SIGNAL_HISTORY_CAP: usize = 50;

/// One archived market analysis text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEntry {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything needed to admit and create a new order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub symbol: String,
    pub name: String,
    pub kind: OrderKind,
    pub quantity: f64,
    pub trigger_price: f64,
    pub current_price: f64,
    pub expires_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub origin: OrderOrigin,
    pub initial_status: OrderStatus,
    /// Skip the duplicate check; funds checks always apply.
    pub override_duplicate: bool,
}

impl OrderDraft {
    /// Draft for a user-created order; starts active.
    pub fn manual(
        symbol: impl Into<String>,
        name: impl Into<String>,
        kind: OrderKind,
        quantity: f64,
        trigger_price: f64,
    ) -> Self {
        OrderDraft {
            symbol: symbol.into(),
            name: name.into(),
            kind,
            quantity,
            trigger_price,
            current_price: 0.0,
            expires_at: None,
            note: None,
            origin: OrderOrigin::Manual,
            initial_status: OrderStatus::Active,
            override_duplicate: false,
        }
    }

    /// Draft for an autopilot-created order; the controller picks the initial
    /// status from its operating mode.
    pub fn autopilot(
        symbol: impl Into<String>,
        name: impl Into<String>,
        kind: OrderKind,
        quantity: f64,
        trigger_price: f64,
        initial_status: OrderStatus,
    ) -> Self {
        OrderDraft {
            symbol: symbol.into(),
            name: name.into(),
            kind,
            quantity,
            trigger_price,
            current_price: 0.0,
            expires_at: None,
            note: None,
            origin: OrderOrigin::Autopilot,
            initial_status,
            override_duplicate: false,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

pub struct Ledger {
    pub(crate) cash_balance: f64,
    pub(crate) initial_capital: f64,
    pub(crate) prior_profit: f64,
    /// Keyed by symbol; one position per instrument.
    pub(crate) positions: HashMap<String, Position>,
    /// Insertion order preserved for stable iteration and export.
    pub(crate) orders: Vec<Order>,
    pub(crate) watchlist: Vec<String>,
    pub(crate) alerts: Vec<PriceAlert>,
    pub(crate) signals: Vec<Signal>,
    pub(crate) last_analysis: Option<String>,
    pub(crate) last_analysis_at: Option<DateTime<Utc>>,
    pub(crate) analysis_history: VecDeque<AnalysisEntry>,
    pub(crate) order_settings: OrderSettings,
    pub(crate) autopilot_settings: AutopilotSettings,
    pub(crate) autopilot_state: AutopilotState,
    pub(crate) autopilot_log: VecDeque<AutopilotLogEntry>,
    pub(crate) admission: AdmissionPolicy,
    pub(crate) default_currency: String,
    pub(crate) next_id: u64,
}

impl Ledger {
    pub fn new(initial_cash: f64) -> Self {
        Ledger {
            cash_balance: initial_cash,
            initial_capital: initial_cash,
            prior_profit: 0.0,
            positions: HashMap::new(),
            orders: Vec::new(),
            watchlist: Vec::new(),
            alerts: Vec::new(),
            signals: Vec::new(),
            last_analysis: None,
            last_analysis_at: None,
            analysis_history: VecDeque::new(),
            order_settings: OrderSettings::default(),
            autopilot_settings: AutopilotSettings::default(),
            autopilot_state: AutopilotState::default(),
            autopilot_log: VecDeque::new(),
            admission: AdmissionPolicy::default(),
            default_currency: "EUR".to_string(),
            next_id: 1,
        }
    }

    // ---- accessors -------------------------------------------------------

    pub fn cash_balance(&self) -> f64 {
        self.cash_balance
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn prior_profit(&self) -> f64 {
        self.prior_profit
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    fn order_mut(&mut self, id: &str) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_open())
    }

    pub fn watchlist(&self) -> &[String] {
        &self.watchlist
    }

    pub fn alerts(&self) -> &[PriceAlert] {
        &self.alerts
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn order_settings(&self) -> &OrderSettings {
        &self.order_settings
    }

    pub fn set_order_settings(&mut self, settings: OrderSettings) {
        self.order_settings = settings;
    }

    pub fn autopilot_settings(&self) -> &AutopilotSettings {
        &self.autopilot_settings
    }

    pub fn set_autopilot_settings(&mut self, settings: AutopilotSettings) {
        self.autopilot_settings = settings;
    }

    pub fn autopilot_state(&self) -> &AutopilotState {
        &self.autopilot_state
    }

    pub fn autopilot_state_mut(&mut self) -> &mut AutopilotState {
        &mut self.autopilot_state
    }

    pub fn autopilot_log(&self) -> impl Iterator<Item = &AutopilotLogEntry> {
        self.autopilot_log.iter()
    }

    pub fn log_autopilot(&mut self, entry: AutopilotLogEntry) {
        push_log_entry(&mut self.autopilot_log, entry);
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        self.admission
    }

    // ---- derived views ---------------------------------------------------

    /// Cash committed by open buy orders: trigger notional plus the fee the
    /// current schedule would charge on it.
    pub fn reserved_cash(&self) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.is_open() && o.kind.is_buy())
            .map(|o| {
                let notional = o.trigger_price * o.quantity;
                notional + self.order_settings.fee(notional)
            })
            .sum()
    }

    /// Shares of `symbol` committed by open sell orders.
    pub fn reserved_quantity(&self, symbol: &str) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.is_open() && o.kind.is_sell() && o.symbol == symbol)
            .map(|o| o.quantity)
            .sum()
    }

    /// Signed value; display flooring at zero is the caller's concern.
    pub fn available_cash(&self) -> f64 {
        self.cash_balance - self.reserved_cash()
    }

    pub fn available_quantity(&self, symbol: &str) -> f64 {
        let held = self.positions.get(symbol).map(|p| p.quantity).unwrap_or(0.0);
        held - self.reserved_quantity(symbol)
    }

    pub fn portfolio_value(&self) -> f64 {
        self.positions.values().map(|p| p.market_value()).sum()
    }

    pub fn total_assets(&self) -> f64 {
        self.portfolio_value() + self.cash_balance
    }

    // ---- order operations ------------------------------------------------

    pub(crate) fn next_order_id(&mut self) -> String {
        let id = format!("ord_{}", self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn next_alert_id(&mut self) -> String {
        let id = format!("alert_{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Admit and create a new order. Admission runs the reservation and
    /// duplicate guard; rejection leaves the ledger untouched and carries the
    /// reason.
    pub fn create_order(&mut self, draft: OrderDraft) -> Result<Order, LedgerError> {
        let policy = self.admission;
        policy.admit(self, &draft)?;

        let id = self.next_order_id();
        let mut order = Order::new(
            id,
            draft.symbol,
            draft.name,
            draft.kind,
            draft.quantity,
            draft.trigger_price,
            draft.current_price,
            draft.initial_status,
            draft.origin,
        )?;
        order.expires_at = draft.expires_at;
        order.note = draft.note;

        info!(
            order_id = %order.id,
            symbol = %order.symbol,
            kind = %order.kind,
            status = %order.status,
            "order created"
        );
        self.orders.push(order.clone());
        Ok(order)
    }

    pub fn cancel_order(&mut self, id: &str, reason: Option<&str>) -> Result<(), LedgerError> {
        let order = self
            .order_mut(id)
            .ok_or_else(|| LedgerError::OrderNotFound(id.to_string()))?;
        order.cancel(reason)?;
        info!(order_id = %id, "order cancelled");
        Ok(())
    }

    /// Pending -> Active. The only confirmation path.
    pub fn confirm_order(&mut self, id: &str) -> Result<(), LedgerError> {
        let order = self
            .order_mut(id)
            .ok_or_else(|| LedgerError::OrderNotFound(id.to_string()))?;
        order.confirm()?;
        info!(order_id = %id, "order confirmed");
        Ok(())
    }

    /// Delete an order regardless of status.
    pub fn remove_order(&mut self, id: &str) -> Result<Order, LedgerError> {
        let idx = self
            .orders
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| LedgerError::OrderNotFound(id.to_string()))?;
        Ok(self.orders.remove(idx))
    }

    pub fn update_order_observed_price(&mut self, id: &str, price: f64) -> Result<(), LedgerError> {
        if !price.is_finite() || price < 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "Invalid observed price: {}",
                price
            )));
        }
        let order = self
            .order_mut(id)
            .ok_or_else(|| LedgerError::OrderNotFound(id.to_string()))?;
        order.current_price = price;
        Ok(())
    }

    /// Transition overdue active orders to expired; returns their ids.
    pub fn expire_orders(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut expired = Vec::new();
        for order in &mut self.orders {
            if order.is_expired(now) {
                order.expire();
                debug!(order_id = %order.id, "order expired");
                expired.push(order.id.clone());
            }
        }
        expired
    }

    // ---- cash ------------------------------------------------------------

    pub fn deposit(&mut self, amount: f64) -> Result<(), LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "Deposit must be positive, got {}",
                amount
            )));
        }
        self.cash_balance += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<(), LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "Withdrawal must be positive, got {}",
                amount
            )));
        }
        if amount > self.cash_balance {
            return Err(LedgerError::InsufficientCash {
                required: amount,
                available: self.cash_balance,
                reserved: self.reserved_cash(),
            });
        }
        self.cash_balance -= amount;
        Ok(())
    }

    // ---- positions -------------------------------------------------------

    /// Merge an externally sourced position (e.g. statement import) into the
    /// book, blending with weighted-average prices when the symbol is held.
    pub fn merge_position(&mut self, position: Position) {
        match self.positions.get_mut(&position.symbol) {
            Some(existing) => existing.apply_buy(position.quantity, position.avg_buy_price),
            None => {
                self.positions.insert(position.symbol.clone(), position);
            }
        }
    }

    /// Apply a live quote to a market-synced position.
    pub fn update_position_price(&mut self, symbol: &str, price: f64) {
        if let Some(position) = self.positions.get_mut(symbol) {
            if position.sync_with_market {
                position.current_price = price;
            }
        }
    }

    // ---- watchlist & alerts ---------------------------------------------

    pub fn add_to_watchlist(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        if !self.watchlist.contains(&symbol) {
            self.watchlist.push(symbol);
        }
    }

    pub fn remove_from_watchlist(&mut self, symbol: &str) {
        self.watchlist.retain(|s| s != symbol);
    }

    pub fn add_alert(&mut self, mut alert: PriceAlert) -> String {
        if alert.id.is_empty() {
            alert.id = self.next_alert_id();
        }
        let id = alert.id.clone();
        self.alerts.push(alert);
        id
    }

    pub fn remove_alert(&mut self, id: &str) {
        self.alerts.retain(|a| a.id != id);
    }

    pub fn mark_alert_triggered(&mut self, id: &str) {
        if let Some(alert) = self.alerts.iter_mut().find(|a| a.id == id) {
            alert.triggered = true;
        }
    }

    // ---- signals & analysis ---------------------------------------------

    pub fn record_signals(&mut self, signals: Vec<Signal>) {
        self.signals.extend(signals);
        if self.signals.len() > SIGNAL_HISTORY_CAP {
            let excess = self.signals.len() - SIGNAL_HISTORY_CAP;
            self.signals.drain(..excess);
        }
    }

    pub fn last_analysis(&self) -> Option<(&str, DateTime<Utc>)> {
        match (&self.last_analysis, self.last_analysis_at) {
            (Some(text), Some(at)) => Some((text.as_str(), at)),
            _ => None,
        }
    }

    pub fn analysis_history(&self) -> impl Iterator<Item = &AnalysisEntry> {
        self.analysis_history.iter()
    }

    pub fn record_analysis(&mut self, text: impl Into<String>, at: DateTime<Utc>) {
        let text = text.into();
        if self.analysis_history.len() >= ANALYSIS_HISTORY_CAP {
            self.analysis_history.pop_front();
        }
        self.analysis_history.push_back(AnalysisEntry {
            text: text.clone(),
            timestamp: at,
        });
        self.last_analysis = Some(text);
        self.last_analysis_at = Some(at);
    }

    /// Recompute the id counter after an import so new ids never collide
    /// with restored ones.
    pub(crate) fn reseed_id_counter(&mut self) {
        let max_existing = self
            .orders
            .iter()
            .map(|o| o.id.as_str())
            .chain(self.alerts.iter().map(|a| a.id.as_str()))
            .filter_map(|id| id.rsplit('_').next())
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_existing + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::order::OrderKind;

    fn ledger_with_position(cash: f64, symbol: &str, qty: f64, price: f64) -> Ledger {
        let mut ledger = Ledger::new(cash);
        ledger.merge_position(
            Position::new(
                format!("pos_{}", symbol),
                symbol.to_string(),
                symbol.to_string(),
                qty,
                price,
                "EUR".to_string(),
            )
            .unwrap(),
        );
        ledger
    }

    #[test]
    fn test_reserved_cash_covers_buy_orders_and_fees() {
        let mut ledger = Ledger::new(10_000.0);
        ledger.order_settings = OrderSettings {
            flat_fee: 1.0,
            percent_fee: 0.0,
            ..Default::default()
        };
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 10.0, 100.0))
            .unwrap();
        // 10 * 100 + 1 flat fee
        assert!((ledger.reserved_cash() - 1001.0).abs() < 1e-9);
        assert!((ledger.available_cash() - 8999.0).abs() < 1e-9);
    }

    #[test]
    fn test_reserved_quantity_only_counts_open_sells_for_symbol() {
        let mut ledger = ledger_with_position(1000.0, "AAPL", 10.0, 50.0);
        ledger.merge_position(
            Position::new(
                "pos_SAP".to_string(),
                "SAP".to_string(),
                "SAP SE".to_string(),
                5.0,
                90.0,
                "EUR".to_string(),
            )
            .unwrap(),
        );
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 4.0, 60.0))
            .unwrap();
        ledger
            .create_order(OrderDraft::manual("SAP", "SAP SE", OrderKind::StopLoss, 2.0, 80.0))
            .unwrap();

        assert_eq!(ledger.reserved_quantity("AAPL"), 4.0);
        assert_eq!(ledger.reserved_quantity("SAP"), 2.0);
        assert_eq!(ledger.available_quantity("AAPL"), 6.0);
    }

    #[test]
    fn test_cancelled_orders_release_reservations() {
        let mut ledger = Ledger::new(1000.0);
        ledger.order_settings = OrderSettings {
            flat_fee: 0.0,
            percent_fee: 0.0,
            ..Default::default()
        };
        let order = ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 5.0, 100.0))
            .unwrap();
        assert!((ledger.reserved_cash() - 500.0).abs() < 1e-9);
        ledger.cancel_order(&order.id, None).unwrap();
        assert_eq!(ledger.reserved_cash(), 0.0);
    }

    #[test]
    fn test_portfolio_value_and_total_assets() {
        let mut ledger = ledger_with_position(250.0, "AAPL", 10.0, 50.0);
        ledger.update_position_price("AAPL", 60.0);
        assert_eq!(ledger.portfolio_value(), 600.0);
        assert_eq!(ledger.total_assets(), 850.0);
    }

    #[test]
    fn test_position_price_not_updated_when_sync_disabled() {
        let mut ledger = ledger_with_position(0.0, "AAPL", 10.0, 50.0);
        ledger.positions.get_mut("AAPL").unwrap().sync_with_market = false;
        ledger.update_position_price("AAPL", 99.0);
        assert_eq!(ledger.position("AAPL").unwrap().current_price, 50.0);
    }

    #[test]
    fn test_confirm_order_pending_to_active_only() {
        let mut ledger = Ledger::new(10_000.0);
        let draft = OrderDraft::autopilot(
            "AAPL",
            "Apple",
            OrderKind::LimitBuy,
            1.0,
            100.0,
            OrderStatus::Pending,
        );
        let order = ledger.create_order(draft).unwrap();
        ledger.confirm_order(&order.id).unwrap();
        assert_eq!(ledger.order(&order.id).unwrap().status, OrderStatus::Active);
        // Active orders cannot be confirmed again.
        assert!(ledger.confirm_order(&order.id).is_err());
    }

    #[test]
    fn test_expire_orders_sweeps_only_overdue_active() {
        let mut ledger = Ledger::new(10_000.0);
        let past = Utc::now() - chrono::Duration::hours(1);
        let order = ledger
            .create_order(
                OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 100.0)
                    .with_expiry(past),
            )
            .unwrap();
        let fresh = ledger
            .create_order(OrderDraft::manual("SAP", "SAP SE", OrderKind::LimitBuy, 1.0, 90.0))
            .unwrap();

        let expired = ledger.expire_orders(Utc::now());
        assert_eq!(expired, vec![order.id.clone()]);
        assert_eq!(ledger.order(&order.id).unwrap().status, OrderStatus::Expired);
        assert_eq!(ledger.order(&fresh.id).unwrap().status, OrderStatus::Active);
    }

    #[test]
    fn test_withdraw_cannot_overdraw() {
        let mut ledger = Ledger::new(100.0);
        assert!(ledger.withdraw(150.0).is_err());
        assert_eq!(ledger.cash_balance(), 100.0);
        ledger.withdraw(40.0).unwrap();
        assert_eq!(ledger.cash_balance(), 60.0);
    }

    #[test]
    fn test_analysis_history_capped_at_five() {
        let mut ledger = Ledger::new(0.0);
        for i in 0..8 {
            ledger.record_analysis(format!("analysis {}", i), Utc::now());
        }
        let history: Vec<_> = ledger.analysis_history().collect();
        assert_eq!(history.len(), ANALYSIS_HISTORY_CAP);
        assert_eq!(history[0].text, "analysis 3");
        assert_eq!(ledger.last_analysis().unwrap().0, "analysis 7");
    }

    #[test]
    fn test_signal_history_drops_oldest_beyond_cap() {
        use crate::domain::entities::signal::{RiskLevel, Signal, TradeDirection};

        let signal = |symbol: String| Signal {
            symbol,
            direction: TradeDirection::Buy,
            confidence: 70.0,
            target_price: None,
            entry_price: None,
            stop_loss: None,
            risk: RiskLevel::Medium,
            reasoning: "momentum".to_string(),
            created_at: Utc::now(),
        };

        let mut ledger = Ledger::new(0.0);
        for batch in 0..20 {
            ledger.record_signals(vec![
                signal(format!("SYM{}", batch * 4)),
                signal(format!("SYM{}", batch * 4 + 1)),
                signal(format!("SYM{}", batch * 4 + 2)),
                signal(format!("SYM{}", batch * 4 + 3)),
            ]);
        }

        assert_eq!(ledger.signals().len(), SIGNAL_HISTORY_CAP);
        // 80 recorded, the first 30 rolled off.
        assert_eq!(ledger.signals()[0].symbol, "SYM30");
        assert_eq!(ledger.signals().last().unwrap().symbol, "SYM79");
    }

    #[test]
    fn test_watchlist_deduplicates() {
        let mut ledger = Ledger::new(0.0);
        ledger.add_to_watchlist("AAPL");
        ledger.add_to_watchlist("AAPL");
        assert_eq!(ledger.watchlist().len(), 1);
        ledger.remove_from_watchlist("AAPL");
        assert!(ledger.watchlist().is_empty());
    }

    #[test]
    fn test_reseed_id_counter_after_restore() {
        let mut ledger = Ledger::new(10_000.0);
        let order = ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 10.0))
            .unwrap();
        assert_eq!(order.id, "ord_1");

        let mut restored = Ledger::new(10_000.0);
        restored.orders = ledger.orders.clone();
        restored.reseed_id_counter();
        let next = restored
            .create_order(OrderDraft::manual("SAP", "SAP SE", OrderKind::LimitBuy, 1.0, 10.0))
            .unwrap();
        assert_eq!(next.id, "ord_2");
    }
}
