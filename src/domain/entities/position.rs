//! Position entity - one owned holding with weighted-average cost accounting.

use crate::domain::errors::LedgerError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub name: String,
    /// Strictly positive; a position at quantity <= 0 is removed, never stored.
    pub quantity: f64,
    /// Quantity-weighted average of all buy prices.
    pub avg_buy_price: f64,
    pub current_price: f64,
    pub currency: String,
    /// Keep `current_price` in sync with live quotes during refresh sweeps.
    pub sync_with_market: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
}

impl Position {
    pub fn new(
        id: String,
        symbol: String,
        name: String,
        quantity: f64,
        buy_price: f64,
        currency: String,
    ) -> Result<Self, LedgerError> {
        let quantity = Quantity::positive(quantity)?.value();
        let buy_price = Price::positive(buy_price)?.value();
        Ok(Position {
            id,
            symbol,
            name,
            quantity,
            avg_buy_price: buy_price,
            current_price: buy_price,
            currency,
            sync_with_market: true,
            isin: None,
        })
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.avg_buy_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    /// Blend a buy fill into the position: weighted-average buy price over the
    /// combined quantity, current price moved to the fill price.
    pub fn apply_buy(&mut self, quantity: f64, price: f64) {
        let total = self.quantity + quantity;
        self.avg_buy_price = (self.avg_buy_price * self.quantity + price * quantity) / total;
        self.quantity = total;
        self.current_price = price;
    }

    /// Reduce the position by a sell fill; returns the remaining quantity.
    /// The caller removes the position when this reaches <= 0.
    pub fn reduce(&mut self, quantity: f64) -> f64 {
        self.quantity -= quantity;
        self.quantity
    }
}
