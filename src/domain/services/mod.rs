pub mod admission;
pub mod execution;
pub mod ledger;
pub mod market_hours;
