//! Gate 3: risk constraints.
//!
//! Hard leverage, liquidity, stability and payout limits, plus an optional
//! sector leverage z-cut. The verdict carries the first failing check as
//! its audit reason and a continuous [0, 1] risk score over all checks
//! that had the data to run.

use crate::domain::financials::Financials;
use crate::domain::sector::SectorStats;

pub const MAX_DEBT_RATIO: f64 = 100.0;
pub const MAX_DEBT_TO_EQUITY: f64 = 1.5;
pub const MAX_NET_INCOME_CV: f64 = 0.5;
pub const MIN_POSITIVE_YEARS: usize = 3;
pub const MAX_PAYOUT_RATIO: f64 = 80.0;
pub const MIN_CURRENT_RATIO: f64 = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskOutcome {
    pub passed: bool,
    pub reason: String,
    /// Fraction of evaluated sub-checks that passed.
    pub risk_score: f64,
}

pub fn evaluate(fin: &Financials, sector: &SectorStats, z_cut: Option<f64>) -> RiskOutcome {
    let mut evaluated = 0usize;
    let mut passed = 0usize;
    let mut first_failure: Option<&'static str> = None;

    let mut record = |outcome: Option<bool>, reason: &'static str| {
        if let Some(ok) = outcome {
            evaluated += 1;
            if ok {
                passed += 1;
            } else if first_failure.is_none() {
                first_failure = Some(reason);
            }
        }
    };

    record(
        fin.debt_ratio.map(|v| v <= MAX_DEBT_RATIO),
        "high_debt_ratio",
    );
    record(
        fin.debt_to_equity.map(|v| v <= MAX_DEBT_TO_EQUITY),
        "high_debt_to_equity",
    );
    record(earnings_stability(fin), "unstable_earnings");
    record(payout_sustainable(fin), "payout_unsustainable");
    record(
        fin.current_ratio.map(|v| v >= MIN_CURRENT_RATIO),
        "low_current_ratio",
    );

    if let (Some(cut), Some(sector_name), Some(debt)) =
        (z_cut, fin.sector.as_deref(), fin.debt_ratio)
    {
        record(
            sector.debt_z_score(sector_name, debt).map(|z| z > cut),
            "sector_leverage_outlier",
        );
    }

    let risk_score = if evaluated > 0 {
        passed as f64 / evaluated as f64
    } else {
        0.0
    };

    match first_failure {
        Some(reason) => RiskOutcome {
            passed: false,
            reason: refine_stability_reason(fin, reason),
            risk_score,
        },
        None => RiskOutcome {
            passed: true,
            reason: "pass".into(),
            risk_score,
        },
    }
}

/// Net-income stability over the 5-year history: needs at least three
/// positive years, then a coefficient of variation at or under the cap.
/// `None` when there is no history to judge (the consistency checks in
/// gate 2 already saw the same absence).
fn earnings_stability(fin: &Financials) -> Option<bool> {
    let values: Vec<f64> = fin
        .history
        .iter()
        .take(5)
        .filter_map(|p| p.net_income)
        .collect();
    if values.is_empty() {
        return None;
    }

    let positive_years = values.iter().filter(|v| **v > 0.0).count();
    if positive_years < MIN_POSITIVE_YEARS {
        return Some(false);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean.abs() < f64::EPSILON {
        return Some(false);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = var.sqrt() / mean.abs();
    Some(cv <= MAX_NET_INCOME_CV)
}

/// A rich payout is only a problem when earnings are already shrinking.
fn payout_sustainable(fin: &Financials) -> Option<bool> {
    let payout = fin.payout_ratio?;
    if payout <= MAX_PAYOUT_RATIO {
        return Some(true);
    }
    match fin.eps_growth {
        Some(growth) => Some(growth >= 0.0),
        // High payout with unknown growth: cannot clear the check.
        None => Some(false),
    }
}

/// Split the stability reason so the audit trail distinguishes "too few
/// profitable years" from "profits jump around".
fn refine_stability_reason(fin: &Financials, reason: &'static str) -> String {
    if reason != "unstable_earnings" {
        return reason.to_string();
    }
    let positive_years = fin
        .history
        .iter()
        .take(5)
        .filter_map(|p| p.net_income)
        .filter(|v| *v > 0.0)
        .count();
    if positive_years < MIN_POSITIVE_YEARS {
        "insufficient_positive_years".to_string()
    } else {
        "earnings_volatility".to_string()
    }
}
