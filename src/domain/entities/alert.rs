//! Price alerts: notification-only triggers, independent of the order book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Above,
    Below,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAlert {
    pub id: String,
    pub symbol: String,
    pub target_price: f64,
    pub direction: AlertDirection,
    /// Set once the level is crossed; an alert fires at most once.
    pub triggered: bool,
    pub created_at: DateTime<Utc>,
}

impl PriceAlert {
    pub fn new(id: String, symbol: String, target_price: f64, direction: AlertDirection) -> Self {
        PriceAlert {
            id,
            symbol,
            target_price,
            direction,
            triggered: false,
            created_at: Utc::now(),
        }
    }

    /// Whether the given market price crosses the alert level.
    pub fn is_crossed(&self, price: f64) -> bool {
        if self.triggered {
            return false;
        }
        match self.direction {
            AlertDirection::Above => price >= self.target_price,
            AlertDirection::Below => price <= self.target_price,
        }
    }
}
