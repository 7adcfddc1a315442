//! Cross-cutting consistency tests for the ledger: reservations, execution
//! accounting and the interplay between them over longer scenarios.

use crate::domain::entities::order::{OrderKind, OrderStatus};
use crate::domain::entities::position::Position;
use crate::domain::entities::settings::OrderSettings;
use crate::domain::services::execution::ExecutionOutcome;
use crate::domain::services::ledger::{Ledger, OrderDraft};
use chrono::Utc;

fn zero_fee(cash: f64) -> Ledger {
    let mut ledger = Ledger::new(cash);
    ledger.set_order_settings(OrderSettings {
        flat_fee: 0.0,
        percent_fee: 0.0,
        ..Default::default()
    });
    ledger
}

fn seed_position(ledger: &mut Ledger, symbol: &str, qty: f64, price: f64) {
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
fn test_total_assets_invariant_through_buy_execution() {
    // With zero fees a buy converts cash into holdings of equal value.
    let mut ledger = zero_fee(1000.0);
    let order = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 4.0, 50.0))
        .unwrap();

    let before = ledger.total_assets();
    ledger.execute_order(&order.id, 50.0, Utc::now()).unwrap();
    assert!((ledger.total_assets() - before).abs() < 1e-9);
    assert_eq!(ledger.cash_balance(), 800.0);
    assert_eq!(ledger.position("AAPL").unwrap().quantity, 4.0);
}

#[test]
fn test_fee_reduces_total_assets_on_execution() {
    let mut ledger = Ledger::new(1000.0);
    ledger.set_order_settings(OrderSettings {
        flat_fee: 5.0,
        percent_fee: 0.0,
        ..Default::default()
    });
    let order = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0))
        .unwrap();
    ledger.execute_order(&order.id, 100.0, Utc::now()).unwrap();

    // 200 notional + 5 fee left the cash account; holdings are worth 200.
    assert_eq!(ledger.cash_balance(), 795.0);
    assert!((ledger.total_assets() - 995.0).abs() < 1e-9);
}

#[test]
fn test_sequential_orders_respect_cumulative_reservations() {
    let mut ledger = zero_fee(1000.0);
    ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 6.0, 100.0))
        .unwrap();
    // 600 reserved; a second 500 buy must be rejected even though the cash
    // balance alone would cover it.
    let second = ledger.create_order(OrderDraft::manual(
        "SAP",
        "SAP SE",
        OrderKind::LimitBuy,
        5.0,
        100.0,
    ));
    assert!(second.is_err());

    // A 400 buy still fits.
    ledger
        .create_order(OrderDraft::manual("SAP", "SAP SE", OrderKind::LimitBuy, 4.0, 100.0))
        .unwrap();
    assert!((ledger.reserved_cash() - 1000.0).abs() < 1e-9);
    assert!(ledger.available_cash().abs() < 1e-9);
}

#[test]
fn test_sell_reservations_track_position_not_cash() {
    let mut ledger = zero_fee(0.0);
    seed_position(&mut ledger, "AAPL", 10.0, 50.0);

    ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::StopLoss, 7.0, 40.0))
        .unwrap();
    assert_eq!(ledger.reserved_cash(), 0.0);
    assert_eq!(ledger.available_quantity("AAPL"), 3.0);

    // Selling the remaining 3 is fine; 4 is not.
    assert!(ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 4.0, 60.0))
        .is_err());
    ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 3.0, 60.0))
        .unwrap();
    assert_eq!(ledger.available_quantity("AAPL"), 0.0);
}

#[test]
fn test_sell_execution_credits_proceeds_minus_fee() {
    let mut ledger = Ledger::new(100.0);
    ledger.set_order_settings(OrderSettings {
        flat_fee: 2.0,
        percent_fee: 1.0,
        ..Default::default()
    });
    seed_position(&mut ledger, "AAPL", 5.0, 50.0);

    let order = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 5.0, 60.0))
        .unwrap();
    let outcome = ledger.execute_order(&order.id, 60.0, Utc::now()).unwrap();

    // Proceeds 300, fee 2 + 3 = 5, credit 295.
    assert!(matches!(outcome, ExecutionOutcome::Executed { fee, .. } if (fee - 5.0).abs() < 1e-9));
    assert!((ledger.cash_balance() - 395.0).abs() < 1e-9);
    assert!(ledger.position("AAPL").is_none());
}

#[test]
fn test_partial_sell_keeps_average_buy_price() {
    let mut ledger = zero_fee(0.0);
    seed_position(&mut ledger, "AAPL", 10.0, 50.0);

    let order = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 4.0, 70.0))
        .unwrap();
    ledger.execute_order(&order.id, 70.0, Utc::now()).unwrap();

    let position = ledger.position("AAPL").unwrap();
    assert_eq!(position.quantity, 6.0);
    assert_eq!(position.avg_buy_price, 50.0);
}

#[test]
fn test_shortfall_buy_auto_cancels_and_preserves_cash() {
    let mut ledger = zero_fee(1000.0);
    let order = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 9.0, 100.0))
        .unwrap();
    // Cash drains between creation and execution.
    ledger.withdraw(500.0).unwrap();

    let outcome = ledger.execute_order(&order.id, 100.0, Utc::now()).unwrap();
    assert!(matches!(
        outcome,
        ExecutionOutcome::CancelledInsufficientCash { .. }
    ));
    assert_eq!(ledger.cash_balance(), 500.0);
    assert_eq!(
        ledger.order(&order.id).unwrap().status,
        OrderStatus::Cancelled
    );
    // Cancellation released the reservation.
    assert_eq!(ledger.reserved_cash(), 0.0);
}

#[test]
fn test_shortfall_sell_auto_cancels_when_shares_gone() {
    let mut ledger = zero_fee(0.0);
    seed_position(&mut ledger, "AAPL", 5.0, 50.0);
    let order = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitSell, 5.0, 60.0))
        .unwrap();

    // The position shrinks out from under the order.
    ledger.positions.get_mut("AAPL").unwrap().quantity = 2.0;

    let outcome = ledger.execute_order(&order.id, 60.0, Utc::now()).unwrap();
    assert!(matches!(
        outcome,
        ExecutionOutcome::CancelledInsufficientShares { requested, held, .. }
            if requested == 5.0 && held == 2.0
    ));
    assert_eq!(ledger.position("AAPL").unwrap().quantity, 2.0);
}

#[test]
fn test_weighted_average_across_two_executed_buys() {
    let mut ledger = zero_fee(10_000.0);
    let first = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 10.0, 100.0))
        .unwrap();
    ledger.execute_order(&first.id, 100.0, Utc::now()).unwrap();

    let second = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::StopBuy, 5.0, 130.0))
        .unwrap();
    ledger.execute_order(&second.id, 130.0, Utc::now()).unwrap();

    let position = ledger.position("AAPL").unwrap();
    assert_eq!(position.quantity, 15.0);
    assert!((position.avg_buy_price - 110.0).abs() < 1e-9);
    assert_eq!(position.current_price, 130.0);
}

#[test]
fn test_duplicate_band_scales_with_trigger_price() {
    let mut ledger = zero_fee(1_000_000.0);
    ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 100.0))
        .unwrap();

    // Within 1% of 100: rejected.
    assert!(ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 100.5))
        .is_err());
    // Outside the band: admitted.
    ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 1.0, 102.0))
        .unwrap();
}

#[test]
fn test_executed_order_is_idempotent_terminal() {
    let mut ledger = zero_fee(1000.0);
    let order = ledger
        .create_order(OrderDraft::manual("AAPL", "Apple", OrderKind::LimitBuy, 2.0, 100.0))
        .unwrap();
    ledger.execute_order(&order.id, 100.0, Utc::now()).unwrap();
    let cash_after = ledger.cash_balance();

    let replay = ledger.execute_order(&order.id, 100.0, Utc::now()).unwrap();
    assert!(matches!(replay, ExecutionOutcome::AlreadyTerminal { .. }));
    assert_eq!(ledger.cash_balance(), cash_after);
    assert_eq!(ledger.position("AAPL").unwrap().quantity, 2.0);
}
