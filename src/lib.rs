//! TradePilot Library
//!
//! Core components of the TradePilot self-directed trading account
//! simulator: the ledger domain, the autopilot controller, external
//! market-data and advisor adapters, and JSON snapshot persistence.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
