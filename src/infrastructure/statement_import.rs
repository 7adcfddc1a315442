//! Broker statement import.
//!
//! Takes a CSV of individual buy/sell trades and folds them into the
//! positions still held, reducing cost basis at the average buy price on
//! every sell. The surviving holdings seed the ledger as positions keyed by
//! ISIN, with name and currency carried along.

use crate::domain::entities::position::Position;
use crate::domain::errors::ImportError;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use tracing::info;

/// Residual quantities below this count as fully sold.
const HELD_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// One statement row: a single trade with its total settlement amount.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeRow {
    pub action: TradeAction,
    pub isin: String,
    pub name: String,
    pub quantity: f64,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
struct Holding {
    isin: String,
    name: String,
    total_quantity: f64,
    buy_quantity: f64,
    total_invested: f64,
    currency: String,
}

/// Read trades from a semicolon-delimited CSV with headers
/// `action;isin;name;quantity;amount;currency`.
pub fn read_trades_csv<R: Read>(reader: R) -> Result<Vec<TradeRow>, ImportError> {
    let mut csv_reader = ReaderBuilder::new().delimiter(b';').from_reader(reader);
    let mut trades = Vec::new();
    for row in csv_reader.deserialize() {
        let trade: TradeRow = row.map_err(|e| ImportError::Malformed(e.to_string()))?;
        if trade.isin.trim().is_empty() {
            return Err(ImportError::Malformed(
                "trade row without ISIN".to_string(),
            ));
        }
        if !trade.quantity.is_finite() || trade.quantity <= 0.0 {
            return Err(ImportError::Malformed(format!(
                "trade for {} has non-positive quantity {}",
                trade.isin, trade.quantity
            )));
        }
        if !trade.amount.is_finite() || trade.amount < 0.0 {
            return Err(ImportError::Malformed(format!(
                "trade for {} has invalid amount {}",
                trade.isin, trade.amount
            )));
        }
        trades.push(trade);
    }
    Ok(trades)
}

/// Fold trades into still-held positions, ordered by instrument name.
pub fn aggregate_trades(trades: &[TradeRow]) -> Vec<Position> {
    let mut holdings: HashMap<String, Holding> = HashMap::new();

    for trade in trades {
        let holding = holdings
            .entry(trade.isin.clone())
            .or_insert_with(|| Holding {
                isin: trade.isin.clone(),
                name: trade.name.clone(),
                total_quantity: 0.0,
                buy_quantity: 0.0,
                total_invested: 0.0,
                currency: trade.currency.clone().unwrap_or_else(|| "EUR".to_string()),
            });

        match trade.action {
            TradeAction::Buy => {
                holding.buy_quantity += trade.quantity;
                holding.total_quantity += trade.quantity;
                holding.total_invested += trade.amount;
            }
            TradeAction::Sell => {
                holding.total_quantity -= trade.quantity;
                if holding.buy_quantity > 0.0 {
                    let avg_buy = holding.total_invested / holding.buy_quantity;
                    holding.total_invested =
                        (holding.total_invested - avg_buy * trade.quantity).max(0.0);
                }
            }
        }
    }

    let mut held: Vec<Holding> = holdings
        .into_values()
        .filter(|h| h.total_quantity > HELD_THRESHOLD)
        .collect();
    held.sort_by(|a, b| a.name.cmp(&b.name));

    held.into_iter()
        .filter_map(|h| {
            let avg_price = if h.buy_quantity > 0.0 {
                h.total_invested / h.buy_quantity
            } else {
                0.0
            };
            let mut position = Position::new(
                format!("pos_{}", h.isin),
                h.isin.clone(),
                h.name,
                h.total_quantity,
                avg_price,
                h.currency,
            )
            .ok()?;
            position.isin = Some(h.isin);
            Some(position)
        })
        .collect()
}

/// Parse a statement CSV into the positions it implies.
pub fn import_statement<R: Read>(reader: R) -> Result<Vec<Position>, ImportError> {
    let trades = read_trades_csv(reader)?;
    let positions = aggregate_trades(&trades);
    info!(
        trades = trades.len(),
        positions = positions.len(),
        "statement imported"
    );
    Ok(positions)
}
