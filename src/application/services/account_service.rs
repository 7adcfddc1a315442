//! Account service: the application-level facade over the ledger.
//!
//! All state lives in one `Ledger` behind a `tokio::sync::RwLock`; every
//! operation here takes the lock for the whole mutation so no caller can
//! observe partially applied state. Quote fetches happen outside the lock.

use crate::domain::entities::alert::PriceAlert;
use crate::domain::entities::order::{Order, OrderStatus};
use crate::domain::entities::position::Position;
use crate::domain::errors::{ImportError, LedgerError};
use crate::domain::repositories::market_data::{Quote, QuoteProvider};
use crate::domain::repositories::notifier::{AccountEvent, NotificationSink};
use crate::domain::services::execution::ExecutionOutcome;
use crate::domain::services::ledger::{Ledger, OrderDraft};
use crate::persistence::AccountDocument;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Aggregated account figures for the portfolio view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub cash_balance: f64,
    /// Floored at zero for display; the ledger itself tracks the signed value.
    pub available_cash: f64,
    pub reserved_cash: f64,
    pub portfolio_value: f64,
    pub total_assets: f64,
    pub initial_capital: f64,
    pub prior_profit: f64,
    pub total_profit: f64,
    pub position_count: usize,
    pub open_order_count: usize,
}

/// What a price sweep did, for logging and tests.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub quotes_applied: usize,
    pub orders_expired: Vec<String>,
    pub orders_executed: Vec<String>,
    pub orders_cancelled: Vec<String>,
    pub alerts_triggered: Vec<String>,
}

pub struct AccountService {
    ledger: Arc<RwLock<Ledger>>,
    quotes: Arc<dyn QuoteProvider>,
    notifier: Arc<dyn NotificationSink>,
}

impl AccountService {
    pub fn new(
        ledger: Arc<RwLock<Ledger>>,
        quotes: Arc<dyn QuoteProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        AccountService {
            ledger,
            quotes,
            notifier,
        }
    }

    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        self.ledger.clone()
    }

    // ---- orders ----------------------------------------------------------

    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, LedgerError> {
        self.ledger.write().await.create_order(draft)
    }

    pub async fn cancel_order(&self, id: &str, reason: Option<&str>) -> Result<(), LedgerError> {
        self.ledger.write().await.cancel_order(id, reason)
    }

    pub async fn confirm_order(&self, id: &str) -> Result<(), LedgerError> {
        self.ledger.write().await.confirm_order(id)
    }

    pub async fn remove_order(&self, id: &str) -> Result<Order, LedgerError> {
        self.ledger.write().await.remove_order(id)
    }

    /// Execute one order now, at the latest market price when a quote is
    /// available, otherwise at the last observed price on the order.
    pub async fn execute_order(&self, id: &str) -> Result<ExecutionOutcome, LedgerError> {
        let (symbol, fallback_price) = {
            let ledger = self.ledger.read().await;
            let order = ledger
                .order(id)
                .ok_or_else(|| LedgerError::OrderNotFound(id.to_string()))?;
            (order.symbol.clone(), order.current_price)
        };

        let price = match self.quotes.get_quote(&symbol).await {
            Ok(Some(quote)) => quote.price,
            Ok(None) => fallback_price,
            Err(e) => {
                warn!(symbol = %symbol, "quote fetch failed before execution: {}", e);
                fallback_price
            }
        };

        let outcome = self.ledger.write().await.execute_order(id, price, Utc::now())?;
        self.notify_outcome(&symbol, &outcome).await;
        Ok(outcome)
    }

    async fn notify_outcome(&self, symbol: &str, outcome: &ExecutionOutcome) {
        let event = match outcome {
            ExecutionOutcome::Executed {
                order_id,
                executed_price,
                ..
            } => Some(AccountEvent::OrderExecuted {
                order_id: order_id.clone(),
                symbol: symbol.to_string(),
                message: format!("Executed at {:.2}", executed_price),
            }),
            ExecutionOutcome::CancelledInsufficientCash {
                order_id,
                required,
                cash,
            } => Some(AccountEvent::OrderCancelled {
                order_id: order_id.clone(),
                symbol: symbol.to_string(),
                reason: format!("Required {:.2} exceeds cash balance {:.2}", required, cash),
            }),
            ExecutionOutcome::CancelledInsufficientShares {
                order_id,
                requested,
                held,
            } => Some(AccountEvent::OrderCancelled {
                order_id: order_id.clone(),
                symbol: symbol.to_string(),
                reason: format!("Position holds {} of {} requested", held, requested),
            }),
            ExecutionOutcome::AlreadyTerminal { .. } => None,
        };
        if let Some(event) = event {
            if let Err(e) = self.notifier.notify(event).await {
                warn!("notification delivery failed: {}", e);
            }
        }
    }

    // ---- price sweep -----------------------------------------------------

    /// One monitoring pass: refresh quotes, expire overdue orders, execute
    /// triggered active orders when auto-execution is on, and fire crossed
    /// price alerts.
    pub async fn run_price_sweep(&self) -> SweepReport {
        let symbols: Vec<String> = {
            let ledger = self.ledger.read().await;
            let mut set: HashSet<String> = HashSet::new();
            for position in ledger.positions() {
                if position.sync_with_market {
                    set.insert(position.symbol.clone());
                }
            }
            for order in ledger.open_orders() {
                set.insert(order.symbol.clone());
            }
            for alert in ledger.alerts() {
                if !alert.triggered {
                    set.insert(alert.symbol.clone());
                }
            }
            set.into_iter().collect()
        };

        let quotes: Vec<(String, Quote)> = match self.quotes.get_quotes(&symbols).await {
            Ok(quotes) => quotes,
            Err(e) => {
                // Keep last known prices; still run the expiry sweep.
                warn!("quote batch failed, prices kept from last sweep: {}", e);
                Vec::new()
            }
        };

        let mut report = SweepReport::default();
        let now = Utc::now();
        let mut executions: Vec<(String, ExecutionOutcome)> = Vec::new();
        let mut alert_events: Vec<AccountEvent> = Vec::new();

        {
            let mut ledger = self.ledger.write().await;

            for (symbol, quote) in &quotes {
                ledger.update_position_price(symbol, quote.price);
                let order_ids: Vec<String> = ledger
                    .orders()
                    .iter()
                    .filter(|o| o.is_open() && &o.symbol == symbol)
                    .map(|o| o.id.clone())
                    .collect();
                for id in order_ids {
                    // id came from the order list above
                    let _ = ledger.update_order_observed_price(&id, quote.price);
                }
                report.quotes_applied += 1;
            }

            report.orders_expired = ledger.expire_orders(now);

            if ledger.order_settings().auto_execute {
                let triggered: Vec<(String, f64, String)> = ledger
                    .orders()
                    .iter()
                    .filter(|o| o.status == OrderStatus::Active)
                    .filter_map(|o| {
                        quotes
                            .iter()
                            .find(|(s, _)| s == &o.symbol)
                            .filter(|(_, q)| o.should_trigger(q.price))
                            .map(|(_, q)| (o.id.clone(), q.price, o.symbol.clone()))
                    })
                    .collect();

                for (id, price, symbol) in triggered {
                    match ledger.execute_order(&id, price, now) {
                        Ok(outcome) => {
                            match &outcome {
                                ExecutionOutcome::Executed { .. } => {
                                    report.orders_executed.push(id.clone())
                                }
                                ExecutionOutcome::CancelledInsufficientCash { .. }
                                | ExecutionOutcome::CancelledInsufficientShares { .. } => {
                                    report.orders_cancelled.push(id.clone())
                                }
                                ExecutionOutcome::AlreadyTerminal { .. } => {}
                            }
                            executions.push((symbol, outcome));
                        }
                        Err(e) => warn!(order_id = %id, "auto-execution failed: {}", e),
                    }
                }
            }

            let crossed: Vec<(String, String, f64)> = ledger
                .alerts()
                .iter()
                .filter_map(|alert| {
                    quotes
                        .iter()
                        .find(|(s, _)| s == &alert.symbol)
                        .filter(|(_, q)| alert.is_crossed(q.price))
                        .map(|(_, q)| (alert.id.clone(), alert.symbol.clone(), q.price))
                })
                .collect();
            for (alert_id, symbol, price) in crossed {
                ledger.mark_alert_triggered(&alert_id);
                info!(alert_id = %alert_id, symbol = %symbol, price, "price alert triggered");
                report.alerts_triggered.push(alert_id.clone());
                alert_events.push(AccountEvent::AlertTriggered {
                    alert_id,
                    symbol,
                    price,
                });
            }
        }

        for (symbol, outcome) in executions {
            self.notify_outcome(&symbol, &outcome).await;
        }
        for event in alert_events {
            if let Err(e) = self.notifier.notify(event).await {
                warn!("notification delivery failed: {}", e);
            }
        }

        report
    }

    // ---- cash, watchlist, alerts ----------------------------------------

    pub async fn deposit(&self, amount: f64) -> Result<(), LedgerError> {
        self.ledger.write().await.deposit(amount)
    }

    pub async fn withdraw(&self, amount: f64) -> Result<(), LedgerError> {
        self.ledger.write().await.withdraw(amount)
    }

    pub async fn add_to_watchlist(&self, symbol: &str) {
        self.ledger.write().await.add_to_watchlist(symbol);
    }

    pub async fn remove_from_watchlist(&self, symbol: &str) {
        self.ledger.write().await.remove_from_watchlist(symbol);
    }

    pub async fn add_alert(&self, alert: PriceAlert) -> String {
        self.ledger.write().await.add_alert(alert)
    }

    pub async fn remove_alert(&self, id: &str) {
        self.ledger.write().await.remove_alert(id);
    }

    pub async fn merge_position(&self, position: Position) {
        self.ledger.write().await.merge_position(position);
    }

    // ---- views & persistence --------------------------------------------

    pub async fn portfolio_summary(&self) -> PortfolioSummary {
        let ledger = self.ledger.read().await;
        let total_assets = ledger.total_assets();
        PortfolioSummary {
            cash_balance: ledger.cash_balance(),
            available_cash: ledger.available_cash().max(0.0),
            reserved_cash: ledger.reserved_cash(),
            portfolio_value: ledger.portfolio_value(),
            total_assets,
            initial_capital: ledger.initial_capital(),
            prior_profit: ledger.prior_profit(),
            total_profit: total_assets - ledger.initial_capital() + ledger.prior_profit(),
            position_count: ledger.positions().count(),
            open_order_count: ledger.open_orders().count(),
        }
    }

    pub async fn export_account(&self) -> AccountDocument {
        AccountDocument::export(&*self.ledger.read().await)
    }

    /// Replace present keys of the account from a previously exported
    /// document. A malformed document fails before any mutation.
    pub async fn import_account(&self, json: &str) -> Result<(), ImportError> {
        let document = AccountDocument::parse(json)?;
        let mut ledger = self.ledger.write().await;
        document.apply(&mut ledger);
        info!("account document imported");
        Ok(())
    }
}
