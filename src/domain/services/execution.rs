//! Execution engine - the only path by which cash or positions change.
//!
//! Execution re-checks balances at execution time (cash may have moved since
//! admission) and recomputes the fee from the settings current now, not the
//! schedule at order creation. Shortfalls downgrade the order to cancelled
//! with an annotated note instead of leaving it stuck.

use crate::domain::entities::position::Position;
use crate::domain::errors::LedgerError;
use crate::domain::services::ledger::Ledger;
use crate::domain::value_objects::price::Price;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Residual quantity below this is treated as a fully closed position.
const QUANTITY_DUST: f64 = 1e-9;

/// Recorded outcome of an execution attempt. Guard failures are outcomes,
/// not errors: the order is cancelled and the ledger left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Executed {
        order_id: String,
        executed_price: f64,
        total_cost: f64,
        fee: f64,
    },
    /// Buy guard: cash moved since creation and no longer covers the fill.
    CancelledInsufficientCash {
        order_id: String,
        required: f64,
        cash: f64,
    },
    /// Sell guard: the position no longer covers the order quantity.
    CancelledInsufficientShares {
        order_id: String,
        requested: f64,
        held: f64,
    },
    /// The order was already terminal; nothing changed.
    AlreadyTerminal { order_id: String },
}

impl Ledger {
    /// Apply a triggered or manually confirmed order at `executed_price`.
    ///
    /// Idempotent on terminal orders: a second call for the same id is a
    /// no-op reported as [`ExecutionOutcome::AlreadyTerminal`].
    pub fn execute_order(
        &mut self,
        order_id: &str,
        executed_price: f64,
        now: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, LedgerError> {
        let executed_price = Price::positive(executed_price)?.value();

        let idx = self
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))?;

        if !self.orders[idx].is_open() {
            return Ok(ExecutionOutcome::AlreadyTerminal {
                order_id: order_id.to_string(),
            });
        }

        let kind = self.orders[idx].kind;
        let quantity = self.orders[idx].quantity;
        let symbol = self.orders[idx].symbol.clone();
        let name = self.orders[idx].name.clone();

        let total_cost = executed_price * quantity;
        // Fee from the schedule current now, not at order creation.
        let fee = self.order_settings.fee(total_cost);

        if kind.is_buy() {
            let required = total_cost + fee;
            if required > self.cash_balance {
                let cash = self.cash_balance;
                self.orders[idx]
                    .cancel(Some(&format!(
                        "Cancelled at execution: required {:.2} exceeds cash balance {:.2}",
                        required, cash
                    )))
                    .ok();
                warn!(order_id, symbol = %symbol, required, cash, "buy cancelled at execution, insufficient cash");
                return Ok(ExecutionOutcome::CancelledInsufficientCash {
                    order_id: order_id.to_string(),
                    required,
                    cash,
                });
            }

            self.cash_balance -= required;
            match self.positions.get_mut(&symbol) {
                Some(position) => position.apply_buy(quantity, executed_price),
                None => {
                    let currency = self.default_currency.clone();
                    let position = Position::new(
                        format!("pos_{}", symbol),
                        symbol.clone(),
                        name,
                        quantity,
                        executed_price,
                        currency,
                    )?;
                    self.positions.insert(symbol.clone(), position);
                }
            }
        } else {
            let held = self.positions.get(&symbol).map(|p| p.quantity).unwrap_or(0.0);
            if held < quantity {
                // No partial fills.
                self.orders[idx]
                    .cancel(Some(&format!(
                        "Cancelled at execution: position holds {} of {} requested",
                        held, quantity
                    )))
                    .ok();
                warn!(order_id, symbol = %symbol, requested = quantity, held, "sell cancelled at execution, insufficient shares");
                return Ok(ExecutionOutcome::CancelledInsufficientShares {
                    order_id: order_id.to_string(),
                    requested: quantity,
                    held,
                });
            }

            self.cash_balance += total_cost - fee;
            let remaining = self
                .positions
                .get_mut(&symbol)
                .map(|p| p.reduce(quantity))
                .unwrap_or(0.0);
            if remaining <= QUANTITY_DUST {
                self.positions.remove(&symbol);
            }
        }

        self.orders[idx].mark_executed(executed_price, now);
        info!(
            order_id,
            symbol = %symbol,
            kind = %kind,
            executed_price,
            total_cost,
            fee,
            "order executed"
        );
        Ok(ExecutionOutcome::Executed {
            order_id: order_id.to_string(),
            executed_price,
            total_cost,
            fee,
        })
    }
}
