//! Point-in-time data access port.
//!
//! The provider contract: never return a record timestamped after `cutoff`.
//! The temporal gate re-checks this anyway and fails closed on violation.

use chrono::NaiveDate;

use crate::domain::financials::{Financials, Price};

/// Why a provider call failed.
///
/// `Timeout` is terminal for the symbol in the current round: the gate
/// treats it as no-data without retrying mid-step. `Transient` failures are
/// retried under the gate's [`RetryPolicy`](crate::domain::retry::RetryPolicy).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderFailure {
    #[error("provider call timed out")]
    Timeout,

    #[error("transient provider failure: {0}")]
    Transient(String),
}

pub trait DataProvider: Send + Sync {
    /// Most recent fundamentals for `symbol` published on or before `cutoff`.
    fn get_financials(
        &self,
        symbol: &str,
        cutoff: NaiveDate,
    ) -> Result<Option<Financials>, ProviderFailure>;

    /// Most recent quote for `symbol` dated on or before `cutoff`.
    fn get_price(&self, symbol: &str, cutoff: NaiveDate)
        -> Result<Option<Price>, ProviderFailure>;
}
