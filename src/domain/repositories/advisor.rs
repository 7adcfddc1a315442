//! Advisor Trait
//!
//! Seam for the external recommendation collaborator. The engine only
//! consumes already-produced signals and suggested orders; how they are
//! generated is out of scope.

use crate::domain::entities::order::Order;
use crate::domain::entities::position::Position;
use crate::domain::entities::signal::{Recommendation, Signal};
use crate::domain::errors::AdvisorError;
use async_trait::async_trait;
use serde::Serialize;

pub type AdvisorResult<T> = Result<T, AdvisorError>;

/// Snapshot of the account handed to the advisor for one cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorRequest {
    pub positions: Vec<Position>,
    pub cash_available: f64,
    pub strategy: String,
    pub risk_tolerance: String,
    pub prior_signals: Vec<Signal>,
    pub open_orders: Vec<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

/// Recommendation collaborator seam.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn recommend(&self, request: AdvisorRequest) -> AdvisorResult<Recommendation>;
}
