//! Fundamental and price record types.
//!
//! All fundamentals are nullable at the edge: providers routinely miss
//! fields, and the eligibility pipeline decides how much absence it will
//! tolerate. [`validate_financials`] is the single validation entry point;
//! no other module inspects raw plausibility.

use chrono::NaiveDate;
use serde::Serialize;

/// Market cap magnitudes outside this range are treated as unit-ambiguous:
/// a cap below ten million almost certainly arrived in millions or billions,
/// one above fifty trillion in the wrong currency minor unit.
pub const MIN_PLAUSIBLE_MARKET_CAP: f64 = 1.0e7;
pub const MAX_PLAUSIBLE_MARKET_CAP: f64 = 5.0e13;

/// One fiscal period of history, most recent first in [`Financials::history`].
#[derive(Debug, Clone, Default)]
pub struct FiscalPeriod {
    pub fiscal_year: i32,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub total_assets: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub debt_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
}

/// Point-in-time fundamental record for one security.
///
/// `report_date` is the publication timestamp the chronology boundary is
/// checked against. Ratios are percentages (ROE of 12.5 means 12.5%),
/// monetary fields are in base currency units.
#[derive(Debug, Clone, Default)]
pub struct Financials {
    pub symbol: String,
    pub report_date: NaiveDate,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,

    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,

    pub debt_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,

    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub ebit: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub owner_earnings: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub dividends_paid: Option<f64>,
    pub buybacks: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub eps_growth: Option<f64>,

    /// Up to five fiscal periods, most recent first.
    pub history: Vec<FiscalPeriod>,
}

impl Financials {
    /// Count how many of the five core fields are missing:
    /// ROE, ROA, debt ratio, net margin, current ratio.
    pub fn missing_core_fields(&self) -> usize {
        [
            self.roe,
            self.roa,
            self.debt_ratio,
            self.net_margin,
            self.current_ratio,
        ]
        .iter()
        .filter(|v| v.is_none())
        .count()
    }

    /// Owner earnings, falling back to free cash flow, then net income.
    pub fn owner_earnings_or_proxy(&self) -> Option<f64> {
        self.owner_earnings
            .or(self.free_cash_flow)
            .or(self.net_income)
    }
}

/// Daily closing quote. `quote_date` is checked against the price cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub symbol: String,
    pub quote_date: NaiveDate,
    pub close: f64,
}

/// Why a fundamental record failed plausibility validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationIssue {
    MissingMarketCap,
    AmbiguousMarketCap,
    NonPositiveSharesOutstanding,
    ImplausibleRatio { field: &'static str },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::MissingMarketCap => write!(f, "missing_market_cap"),
            ValidationIssue::AmbiguousMarketCap => write!(f, "ambiguous_market_cap"),
            ValidationIssue::NonPositiveSharesOutstanding => {
                write!(f, "non_positive_shares_outstanding")
            }
            ValidationIssue::ImplausibleRatio { field } => write!(f, "implausible_{field}"),
        }
    }
}

/// Centralized plausibility validation for fundamental records.
///
/// Checks only what cannot be tolerated downstream: market cap presence and
/// unit plausibility, share count sign, and ratios so far outside any real
/// balance sheet that the record must be corrupt. Field absence is not an
/// issue here; the reliability gate has its own missing-field budget.
pub fn validate_financials(fin: &Financials) -> Result<(), ValidationIssue> {
    match fin.market_cap {
        None => return Err(ValidationIssue::MissingMarketCap),
        Some(cap) => {
            if !cap.is_finite()
                || cap < MIN_PLAUSIBLE_MARKET_CAP
                || cap > MAX_PLAUSIBLE_MARKET_CAP
            {
                return Err(ValidationIssue::AmbiguousMarketCap);
            }
        }
    }

    if let Some(shares) = fin.shares_outstanding {
        if shares <= 0.0 {
            return Err(ValidationIssue::NonPositiveSharesOutstanding);
        }
    }

    if let Some(debt_ratio) = fin.debt_ratio {
        if !(0.0..=1000.0).contains(&debt_ratio) {
            return Err(ValidationIssue::ImplausibleRatio {
                field: "debt_ratio",
            });
        }
    }

    if let Some(current_ratio) = fin.current_ratio {
        if !(0.0..=100.0).contains(&current_ratio) {
            return Err(ValidationIssue::ImplausibleRatio {
                field: "current_ratio",
            });
        }
    }

    if let Some(margin) = fin.net_margin {
        if !(-500.0..=500.0).contains(&margin) {
            return Err(ValidationIssue::ImplausibleRatio { field: "net_margin" });
        }
    }

    Ok(())
}
