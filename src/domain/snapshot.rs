//! Temporal data gate: the chronology boundary.
//!
//! Every data read in the engine goes through [`TemporalDataGate`]. The gate
//! computes lag-adjusted cutoffs, delegates the bounded query to the
//! provider, and re-verifies every returned timestamp. On any doubt it fails
//! closed: no snapshot rather than a snapshot that might leak the future.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::error::ValuesimError;
use crate::domain::financials::{Financials, Price};
use crate::domain::retry::RetryPolicy;
use crate::ports::data_port::{DataProvider, ProviderFailure};

/// Immutable as-of view of one security. Only the gate constructs these.
#[derive(Debug, Clone)]
pub struct AsOfSnapshot {
    pub symbol: String,
    pub as_of_date: NaiveDate,
    pub financials: Financials,
    pub price: Price,
}

/// Step back `n` business days from `date` (weekends only, no holiday
/// calendar — unknown holidays err on the side of an older cutoff is wrong,
/// so the price lag stays a strict weekday count).
pub fn business_days_back(date: NaiveDate, n: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = n;
    while remaining > 0 {
        current = current
            .checked_sub_days(Days::new(1))
            .unwrap_or(current);
        match current.weekday() {
            Weekday::Sat | Weekday::Sun => {}
            _ => remaining -= 1,
        }
    }
    current
}

type CacheKey = (String, NaiveDate, NaiveDate);

/// Per-run snapshot cache. One per gate, one gate per run; shared across
/// pipeline workers behind a mutex. Negative results are cached too so a
/// symbol with no data is not re-queried for the same cutoff pair.
#[derive(Default)]
struct SnapshotCache {
    entries: HashMap<CacheKey, Option<AsOfSnapshot>>,
}

pub struct TemporalDataGate {
    provider: Arc<dyn DataProvider>,
    financial_lag_days: u32,
    price_lag_days: u32,
    retry: RetryPolicy,
    cache: Mutex<SnapshotCache>,
}

impl TemporalDataGate {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        financial_lag_days: u32,
        price_lag_days: u32,
        retry: RetryPolicy,
    ) -> Self {
        TemporalDataGate {
            provider,
            financial_lag_days,
            price_lag_days,
            retry,
            cache: Mutex::new(SnapshotCache::default()),
        }
    }

    /// Calendar-day cutoff for fundamentals: publication lag of quarterly
    /// reports means a report "as of" a fiscal date is not public until
    /// roughly a quarter later.
    pub fn financial_cutoff(&self, as_of_date: NaiveDate) -> NaiveDate {
        as_of_date
            .checked_sub_days(Days::new(u64::from(self.financial_lag_days)))
            .unwrap_or(as_of_date)
    }

    /// Business-day cutoff for prices: trade on information from the prior
    /// settled close, not the same-day print.
    pub fn price_cutoff(&self, as_of_date: NaiveDate) -> NaiveDate {
        business_days_back(as_of_date, self.price_lag_days)
    }

    /// Build the as-of snapshot for `symbol`, or fail closed.
    ///
    /// Fails with `DataUnavailable` when the provider has nothing on or
    /// before the cutoff, when it times out, when retries are exhausted, and
    /// when a returned record is dated after its cutoff. The last case is a
    /// provider contract violation; it is logged and the record discarded
    /// rather than clamped.
    pub fn get_snapshot(
        &self,
        symbol: &str,
        as_of_date: NaiveDate,
    ) -> Result<AsOfSnapshot, ValuesimError> {
        let financial_cutoff = self.financial_cutoff(as_of_date);
        let price_cutoff = self.price_cutoff(as_of_date);
        let key = (symbol.to_string(), financial_cutoff, price_cutoff);

        if let Some(cached) = self.cache.lock().entries.get(&key) {
            return cached
                .clone()
                .ok_or_else(|| unavailable(symbol, as_of_date));
        }

        let snapshot = self.fetch(symbol, as_of_date, financial_cutoff, price_cutoff);
        self.cache.lock().entries.insert(key, snapshot.clone());
        snapshot.ok_or_else(|| unavailable(symbol, as_of_date))
    }

    fn fetch(
        &self,
        symbol: &str,
        as_of_date: NaiveDate,
        financial_cutoff: NaiveDate,
        price_cutoff: NaiveDate,
    ) -> Option<AsOfSnapshot> {
        let financials = match self
            .retry
            .run(|| self.provider.get_financials(symbol, financial_cutoff))
        {
            Ok(Some(fin)) => fin,
            Ok(None) => {
                debug!("{symbol}: no financials on or before {financial_cutoff}");
                return None;
            }
            Err(failure) => {
                log_provider_failure(symbol, "financials", &failure);
                return None;
            }
        };

        if financials.report_date > financial_cutoff {
            warn!(
                "{symbol}: provider returned financials dated {} after cutoff {financial_cutoff}, discarding",
                financials.report_date
            );
            return None;
        }

        let price = match self.retry.run(|| self.provider.get_price(symbol, price_cutoff)) {
            Ok(Some(price)) => price,
            Ok(None) => {
                debug!("{symbol}: no price on or before {price_cutoff}");
                return None;
            }
            Err(failure) => {
                log_provider_failure(symbol, "price", &failure);
                return None;
            }
        };

        if price.quote_date > price_cutoff {
            warn!(
                "{symbol}: provider returned price dated {} after cutoff {price_cutoff}, discarding",
                price.quote_date
            );
            return None;
        }

        if !price.close.is_finite() || price.close <= 0.0 {
            warn!("{symbol}: non-positive close {} discarded", price.close);
            return None;
        }

        Some(AsOfSnapshot {
            symbol: symbol.to_string(),
            as_of_date,
            financials,
            price,
        })
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.cache.lock().entries.len()
    }
}

fn unavailable(symbol: &str, as_of: NaiveDate) -> ValuesimError {
    ValuesimError::DataUnavailable {
        symbol: symbol.to_string(),
        as_of: as_of.to_string(),
    }
}

fn log_provider_failure(symbol: &str, what: &str, failure: &ProviderFailure) {
    match failure {
        ProviderFailure::Timeout => {
            warn!("{symbol}: {what} query timed out, excluded this round")
        }
        ProviderFailure::Transient(reason) => {
            warn!("{symbol}: {what} query failed after retries: {reason}")
        }
    }
}
