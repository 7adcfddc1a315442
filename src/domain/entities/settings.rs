//! Process-wide order settings: auto-execution, check interval, fee schedule.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSettings {
    /// Execute triggered active orders automatically during price sweeps.
    pub auto_execute: bool,
    /// Interval between periodic price checks.
    pub check_interval_secs: u64,
    /// Flat fee charged once per executed order.
    pub flat_fee: f64,
    /// Percentage fee on the order notional (e.g. 0.25 = 0.25%).
    pub percent_fee: f64,
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            auto_execute: true,
            check_interval_secs: 300,
            flat_fee: 1.0,
            percent_fee: 0.25,
        }
    }
}

impl OrderSettings {
    /// Fee for a given notional. Symmetric for buys and sells, never negative.
    /// Always computed from the settings current at execution time.
    pub fn fee(&self, notional: f64) -> f64 {
        (self.flat_fee + notional * self.percent_fee / 100.0).max(0.0)
    }
}
