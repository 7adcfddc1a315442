//! Autopilot controller: the periodic self-directed trading cycle.
//!
//! One cycle asks the advisor for a recommendation and walks every suggested
//! order through the safety pipeline (permissions, confidence floor, position
//! size cap, cash reserve, duplicate guard) before anything reaches the
//! ledger. A re-entrancy flag on the ledger state rejects overlapping cycles;
//! the scheduler and the manual run-now endpoint share the same path.

use crate::domain::entities::autopilot::{
    AutopilotLogEntry, AutopilotMode, AutopilotSettings, LogKind, PermissionKind,
};
use crate::domain::entities::order::{OrderOrigin, OrderStatus};
use crate::domain::entities::signal::SuggestedOrder;
use crate::domain::errors::LedgerError;
use crate::domain::repositories::advisor::{Advisor, AdvisorRequest};
use crate::domain::repositories::notifier::{AccountEvent, NotificationSink};
use crate::domain::services::ledger::{Ledger, OrderDraft};
use crate::domain::services::market_hours::any_market_open;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// What one cycle did.
#[derive(Debug, Default, PartialEq)]
pub struct CycleReport {
    pub ran_advisor: bool,
    pub orders_created: usize,
    pub suggestions_skipped: usize,
    pub stale_orders_cancelled: usize,
}

pub struct AutopilotController {
    ledger: Arc<RwLock<Ledger>>,
    advisor: Arc<dyn Advisor>,
    notifier: Arc<dyn NotificationSink>,
    strategy: String,
    risk_tolerance: String,
}

impl AutopilotController {
    pub fn new(
        ledger: Arc<RwLock<Ledger>>,
        advisor: Arc<dyn Advisor>,
        notifier: Arc<dyn NotificationSink>,
        strategy: String,
        risk_tolerance: String,
    ) -> Self {
        AutopilotController {
            ledger,
            advisor,
            notifier,
            strategy,
            risk_tolerance,
        }
    }

    /// Spawn the scheduler loop. Returns the shutdown handle; sending `true`
    /// (or dropping the sender) stops the loop after the current wait.
    pub fn spawn(self: Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            info!("Autopilot scheduler started");
            loop {
                let (enabled, interval_secs) = {
                    let ledger = self.ledger.read().await;
                    let settings = ledger.autopilot_settings();
                    (settings.enabled, settings.interval_secs)
                };

                // Disabled autopilot polls at a short fixed pace so an enable
                // takes effect without restarting the scheduler.
                let wait = if enabled {
                    Duration::from_secs(interval_secs.max(1))
                } else {
                    Duration::from_secs(15)
                };

                tokio::select! {
                    _ = sleep(wait) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Autopilot scheduler received shutdown signal");
                            break;
                        }
                    }
                }

                // Re-read after the wait: a disable during the sleep must
                // take effect before the next cycle, not one tick later.
                let enabled = self.ledger.read().await.autopilot_settings().enabled;
                if !enabled {
                    continue;
                }
                match self.run_cycle(Utc::now()).await {
                    Ok(report) => {
                        info!(
                            orders_created = report.orders_created,
                            suggestions_skipped = report.suggestions_skipped,
                            "autopilot cycle finished"
                        );
                    }
                    Err(LedgerError::CycleInProgress) => {
                        warn!("autopilot cycle still in progress, skipping tick");
                    }
                    Err(e) => error!("autopilot cycle failed: {}", e),
                }
            }
        });
        shutdown_tx
    }

    /// Run one cycle now. Fails with [`LedgerError::CycleInProgress`] when a
    /// cycle is already running; the flag is cleared on every exit path.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, LedgerError> {
        {
            let mut ledger = self.ledger.write().await;
            if ledger.autopilot_state().is_running {
                return Err(LedgerError::CycleInProgress);
            }
            ledger.autopilot_state_mut().is_running = true;
        }

        let result = self.run_cycle_inner(now).await;

        {
            let mut ledger = self.ledger.write().await;
            let interval = ledger.autopilot_settings().interval_secs;
            let state = ledger.autopilot_state_mut();
            state.is_running = false;
            state.last_run_at = Some(now);
            state.next_run_at = Some(now + ChronoDuration::seconds(interval as i64));
            state.cycles_completed += 1;
            if let Ok(report) = &result {
                state.orders_created_total += report.orders_created as u64;
            }
        }

        result
    }

    async fn run_cycle_inner(&self, now: DateTime<Utc>) -> Result<CycleReport, LedgerError> {
        let mut report = CycleReport::default();

        let (settings, request) = {
            let ledger = self.ledger.read().await;
            let settings = ledger.autopilot_settings().clone();

            // The manual run-now path lands here too; a disabled autopilot
            // never trades, whoever asks.
            if !settings.enabled {
                drop(ledger);
                let mut ledger = self.ledger.write().await;
                ledger.log_autopilot(AutopilotLogEntry::new(
                    LogKind::Info,
                    "Cycle skipped: autopilot is disabled",
                ));
                return Ok(report);
            }

            if settings.active_hours_only && !any_market_open(now) {
                drop(ledger);
                let mut ledger = self.ledger.write().await;
                ledger.log_autopilot(AutopilotLogEntry::new(
                    LogKind::Info,
                    "Cycle skipped: all market windows closed",
                ));
                return Ok(report);
            }

            let request = AdvisorRequest {
                positions: ledger.positions().cloned().collect(),
                cash_available: ledger.available_cash().max(0.0),
                strategy: self.strategy.clone(),
                risk_tolerance: self.risk_tolerance.clone(),
                prior_signals: ledger.signals().to_vec(),
                open_orders: ledger.open_orders().cloned().collect(),
                custom_prompt: None,
            };
            (settings, request)
        };

        let recommendation = match self.advisor.recommend(request).await {
            Ok(recommendation) => recommendation,
            Err(e) => {
                let mut ledger = self.ledger.write().await;
                ledger.log_autopilot(AutopilotLogEntry::new(
                    LogKind::Error,
                    format!("Advisor request failed: {}", e),
                ));
                return Ok(report);
            }
        };
        report.ran_advisor = true;

        let mut ledger = self.ledger.write().await;

        if let Some(analysis) = &recommendation.analysis {
            ledger.record_analysis(analysis.clone(), now);
        }
        if !recommendation.signals.is_empty() {
            ledger.record_signals(recommendation.signals.clone());
        }

        for suggestion in &recommendation.suggested_orders {
            if report.orders_created >= settings.max_trades_per_cycle {
                report.suggestions_skipped += 1;
                ledger.log_autopilot(
                    AutopilotLogEntry::new(
                        LogKind::Skipped,
                        format!(
                            "Trade cap reached ({} per cycle)",
                            settings.max_trades_per_cycle
                        ),
                    )
                    .with_symbol(&suggestion.symbol),
                );
                continue;
            }

            if let Some(reason) = Self::rejection_reason(&ledger, &settings, suggestion) {
                report.suggestions_skipped += 1;
                ledger.log_autopilot(
                    AutopilotLogEntry::new(LogKind::Skipped, reason)
                        .with_symbol(&suggestion.symbol),
                );
                continue;
            }

            if settings.mode == AutopilotMode::SuggestOnly {
                report.suggestions_skipped += 1;
                ledger.log_autopilot(
                    AutopilotLogEntry::new(
                        LogKind::Info,
                        format!(
                            "Suggestion: {} {} x {} @ {:.2} ({})",
                            suggestion.kind,
                            suggestion.symbol,
                            suggestion.quantity,
                            suggestion.trigger_price,
                            suggestion.reasoning
                        ),
                    )
                    .with_symbol(&suggestion.symbol),
                );
                continue;
            }

            // A fresh recommendation supersedes this controller's own open
            // orders on the same symbol and side.
            let stale: Vec<String> = ledger
                .open_orders()
                .filter(|o| {
                    o.origin == OrderOrigin::Autopilot
                        && o.symbol == suggestion.symbol
                        && o.kind == suggestion.kind
                })
                .map(|o| o.id.clone())
                .collect();
            for id in stale {
                if ledger
                    .cancel_order(&id, Some("Superseded by new recommendation"))
                    .is_ok()
                {
                    report.stale_orders_cancelled += 1;
                    ledger.log_autopilot(
                        AutopilotLogEntry::new(LogKind::Info, "Cancelled superseded order")
                            .with_symbol(&suggestion.symbol)
                            .with_order_id(&id),
                    );
                }
            }

            let initial_status = match settings.mode {
                AutopilotMode::FullAuto => OrderStatus::Active,
                _ => OrderStatus::Pending,
            };
            let name = if suggestion.name.is_empty() {
                suggestion.symbol.clone()
            } else {
                suggestion.name.clone()
            };
            let draft = OrderDraft::autopilot(
                suggestion.symbol.clone(),
                name,
                suggestion.kind,
                suggestion.quantity,
                suggestion.trigger_price,
                initial_status,
            )
            .with_note(suggestion.reasoning.clone());

            match ledger.create_order(draft) {
                Ok(order) => {
                    report.orders_created += 1;
                    ledger.log_autopilot(
                        AutopilotLogEntry::new(
                            LogKind::Created,
                            format!(
                                "Created {} order: {} x {} @ {:.2}",
                                order.status, order.kind, order.quantity, order.trigger_price
                            ),
                        )
                        .with_symbol(&order.symbol)
                        .with_order_id(&order.id),
                    );
                }
                Err(e) => {
                    report.suggestions_skipped += 1;
                    ledger.log_autopilot(
                        AutopilotLogEntry::new(LogKind::Skipped, format!("Rejected: {}", e))
                            .with_symbol(&suggestion.symbol),
                    );
                }
            }
        }
        drop(ledger);

        if report.orders_created > 0 {
            let event = AccountEvent::AutopilotDecision {
                message: format!(
                    "Autopilot created {} order(s), skipped {} suggestion(s)",
                    report.orders_created, report.suggestions_skipped
                ),
            };
            if let Err(e) = self.notifier.notify(event).await {
                warn!("notification delivery failed: {}", e);
            }
        }

        Ok(report)
    }

    /// Safety pipeline for one suggestion; `None` means it may proceed.
    fn rejection_reason(
        ledger: &Ledger,
        settings: &AutopilotSettings,
        suggestion: &SuggestedOrder,
    ) -> Option<String> {
        let is_buy = suggestion.kind.is_buy();

        if is_buy && !settings.permissions.allows(PermissionKind::Buy) {
            return Some("Buying is not permitted".to_string());
        }
        if !is_buy && !settings.permissions.allows(PermissionKind::Sell) {
            return Some("Selling is not permitted".to_string());
        }

        let held = ledger.position(&suggestion.symbol).is_some();
        if is_buy && !held && !settings.permissions.allows(PermissionKind::NewPositions) {
            return Some(format!(
                "New positions are not permitted ({} not held)",
                suggestion.symbol
            ));
        }
        if settings.permissions.allows(PermissionKind::WatchlistOnly)
            && !held
            && !ledger.watchlist().contains(&suggestion.symbol)
        {
            return Some(format!(
                "{} is neither held nor on the watchlist",
                suggestion.symbol
            ));
        }

        if suggestion.confidence < settings.min_confidence {
            return Some(format!(
                "Confidence {:.0} below minimum {:.0}",
                suggestion.confidence, settings.min_confidence
            ));
        }

        if is_buy {
            let total_assets = ledger.total_assets();
            let notional = suggestion.quantity * suggestion.trigger_price;

            if total_assets > 0.0 {
                // Exposure counts the held position plus every open buy order
                // for the symbol, so suggestions admitted earlier in this
                // cycle cannot jointly breach the cap.
                let queued: f64 = ledger
                    .open_orders()
                    .filter(|o| o.symbol == suggestion.symbol && o.kind.is_buy())
                    .map(|o| o.quantity * o.trigger_price)
                    .sum();
                let current_exposure = ledger
                    .position(&suggestion.symbol)
                    .map(|p| p.market_value())
                    .unwrap_or(0.0)
                    + queued;
                let max_position = total_assets * settings.max_position_percent / 100.0;
                if current_exposure + notional > max_position {
                    return Some(format!(
                        "Position size {:.2} would exceed {:.0}% of total assets",
                        current_exposure + notional,
                        settings.max_position_percent
                    ));
                }

                let fee = ledger.order_settings().fee(notional);
                let reserve_floor = total_assets * settings.min_cash_reserve_percent / 100.0;
                if ledger.available_cash() - notional - fee < reserve_floor {
                    return Some(format!(
                        "Would breach the {:.0}% cash reserve",
                        settings.min_cash_reserve_percent
                    ));
                }
            }
        }

        None
    }
}
