//! Reservation & duplicate guard for new orders.
//!
//! Admission looks at what open orders already commit (cash for buys, shares
//! for sells) so a new order can never push reservations past the balances
//! that back them, and suppresses near-identical duplicates of an open order.

use crate::domain::entities::order::OrderStatus;
use crate::domain::errors::LedgerError;
use crate::domain::services::ledger::{Ledger, OrderDraft};
use crate::domain::value_objects::{price::Price, quantity::Quantity};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionPolicy {
    /// Two open orders of the same symbol and kind count as duplicates when
    /// their triggers differ by at most this percentage of the existing one.
    pub duplicate_tolerance_percent: f64,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy {
            duplicate_tolerance_percent: 1.0,
        }
    }
}

impl AdmissionPolicy {
    /// Full admission check: shape, funds, duplicates. No mutation.
    pub fn admit(&self, ledger: &Ledger, draft: &OrderDraft) -> Result<(), LedgerError> {
        validate_draft(draft)?;
        check_funds(ledger, draft)?;
        if !draft.override_duplicate {
            self.check_duplicate(ledger, draft)?;
        }
        Ok(())
    }

    /// Reject a draft that materially repeats an open order.
    pub fn check_duplicate(&self, ledger: &Ledger, draft: &OrderDraft) -> Result<(), LedgerError> {
        let tolerance = self.duplicate_tolerance_percent / 100.0;
        for order in ledger.open_orders() {
            if order.symbol != draft.symbol || order.kind != draft.kind {
                continue;
            }
            let band = order.trigger_price * tolerance;
            if (draft.trigger_price - order.trigger_price).abs() <= band {
                return Err(LedgerError::DuplicateOrder {
                    symbol: draft.symbol.clone(),
                    kind: draft.kind.to_string(),
                    existing_id: order.id.clone(),
                    existing_trigger: order.trigger_price,
                });
            }
        }
        Ok(())
    }
}

fn validate_draft(draft: &OrderDraft) -> Result<(), LedgerError> {
    if draft.symbol.is_empty() {
        return Err(LedgerError::InvalidInput("Symbol must not be empty".to_string()));
    }
    Quantity::positive(draft.quantity)?;
    Price::positive(draft.trigger_price)?;
    if !matches!(draft.initial_status, OrderStatus::Pending | OrderStatus::Active) {
        return Err(LedgerError::InvalidInput(format!(
            "New orders must start pending or active, not {}",
            draft.initial_status
        )));
    }
    Ok(())
}

/// Capital check for buys, share check for sells, both against the
/// reservation-aware available balances.
pub fn check_funds(ledger: &Ledger, draft: &OrderDraft) -> Result<(), LedgerError> {
    if draft.kind.is_buy() {
        let notional = draft.trigger_price * draft.quantity;
        let required = notional + ledger.order_settings().fee(notional);
        let available = ledger.available_cash();
        if required > available {
            return Err(LedgerError::InsufficientCash {
                required,
                available,
                reserved: ledger.reserved_cash(),
            });
        }
    } else {
        let available = ledger.available_quantity(&draft.symbol);
        if draft.quantity > available {
            return Err(LedgerError::InsufficientShares {
                symbol: draft.symbol.clone(),
                requested: draft.quantity,
                available,
                reserved: ledger.reserved_quantity(&draft.symbol),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::order::OrderKind;
    use crate::domain::entities::position::Position;
    use crate::domain::entities::settings::OrderSettings;

    fn zero_fee_ledger(cash: f64) -> Ledger {
        let mut ledger = Ledger::new(cash);
        ledger.set_order_settings(OrderSettings {
            flat_fee: 0.0,
            percent_fee: 0.0,
            ..Default::default()
        });
        ledger
    }

    fn add_position(ledger: &mut Ledger, symbol: &str, qty: f64, price: f64) {
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
    }

    #[test]
    fn test_buy_rejected_when_reservations_exhaust_cash() {
        let mut ledger = zero_fee_ledger(1000.0);
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 8.0, 100.0))
            .unwrap();

        // 800 reserved; another 300 would exceed the 1000 balance.
        let draft = OrderDraft::manual("SAP", "SAP SE", OrderKind::LimitBuy, 3.0, 100.0);
        let err = ledger.create_order(draft).unwrap_err();
        match err {
            LedgerError::InsufficientCash {
                required,
                available,
                reserved,
            } => {
                assert!((required - 300.0).abs() < 1e-9);
                assert!((available - 200.0).abs() < 1e-9);
                assert!((reserved - 800.0).abs() < 1e-9);
            }
            other => panic!("expected InsufficientCash, got {:?}", other),
        }
    }

    #[test]
    fn test_buy_fee_counts_toward_required_cash() {
        let mut ledger = Ledger::new(100.0);
        ledger.set_order_settings(OrderSettings {
            flat_fee: 5.0,
            percent_fee: 0.0,
            ..Default::default()
        });
        // Notional exactly 100 but the fee pushes it past the balance.
        let draft = OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 100.0);
        assert!(matches!(
            ledger.create_order(draft),
            Err(LedgerError::InsufficientCash { .. })
        ));
    }

    #[test]
    fn test_sell_rejected_without_position() {
        let mut ledger = zero_fee_ledger(1000.0);
        let draft = OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 10.0, 100.0);
        match ledger.create_order(draft).unwrap_err() {
            LedgerError::InsufficientShares {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 10.0);
                assert_eq!(available, 0.0);
            }
            other => panic!("expected InsufficientShares, got {:?}", other),
        }
    }

    #[test]
    fn test_sell_reservation_counts_prior_open_orders() {
        let mut ledger = zero_fee_ledger(1000.0);
        add_position(&mut ledger, "AAPL", 5.0, 50.0);
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 3.0, 60.0))
            .unwrap();
        // Only 2 shares remain unreserved.
        let draft = OrderDraft::manual("AAPL", "Apple", OrderKind::StopLoss, 3.0, 40.0);
        assert!(matches!(
            ledger.create_order(draft),
            Err(LedgerError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_duplicate_within_tolerance_rejected() {
        let mut ledger = zero_fee_ledger(10_000.0);
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0))
            .unwrap();

        // 100.50 is within the 1% band around 100.
        let near = OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 100.5);
        assert!(matches!(
            ledger.create_order(near),
            Err(LedgerError::DuplicateOrder { .. })
        ));
    }

    #[test]
    fn test_duplicate_different_kind_admitted() {
        let mut ledger = zero_fee_ledger(10_000.0);
        add_position(&mut ledger, "AAPL", 5.0, 100.0);
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0))
            .unwrap();

        let sell = OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 2.0, 110.0);
        assert!(ledger.create_order(sell).is_ok());
    }

    #[test]
    fn test_duplicate_outside_tolerance_admitted() {
        let mut ledger = zero_fee_ledger(10_000.0);
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0))
            .unwrap();

        let far = OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 105.0);
        assert!(ledger.create_order(far).is_ok());
    }

    #[test]
    fn test_duplicate_override_flag_bypasses_check() {
        let mut ledger = zero_fee_ledger(10_000.0);
        ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0))
            .unwrap();

        let mut near = OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 100.5);
        near.override_duplicate = true;
        assert!(ledger.create_order(near).is_ok());
    }

    #[test]
    fn test_terminal_orders_do_not_count_as_duplicates() {
        let mut ledger = zero_fee_ledger(10_000.0);
        let order = ledger
            .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0))
            .unwrap();
        ledger.cancel_order(&order.id, None).unwrap();

        let again = OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0);
        assert!(ledger.create_order(again).is_ok());
    }
}
