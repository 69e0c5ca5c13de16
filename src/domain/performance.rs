//! Performance statistics over the recorded value history.
//!
//! Pure functions: the analyzer never mutates the ledger and never fails.
//! With fewer than two value points every statistic degrades to zero.

use serde::Serialize;

use crate::domain::ledger::{Trade, ValuePoint};
use crate::domain::rebalance::MissedBuy;

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub turnover: f64,
}

impl PerformanceSummary {
    pub fn zeroed() -> Self {
        PerformanceSummary {
            total_return: 0.0,
            annualized_return: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            turnover: 0.0,
        }
    }
}

/// Full result record handed to reporting.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub summary: PerformanceSummary,
    pub trade_log: Vec<Trade>,
    pub value_history: Vec<ValuePoint>,
    pub missed_buys: Vec<MissedBuy>,
}

/// Compute the summary statistics.
///
/// `periods_per_year` reflects the rebalance frequency (12 for monthly,
/// 4 for quarterly); `risk_free_rate` is annualized.
pub fn analyze(
    value_history: &[ValuePoint],
    trades: &[Trade],
    periods_per_year: f64,
    risk_free_rate: f64,
) -> PerformanceSummary {
    if value_history.len() < 2 {
        return PerformanceSummary::zeroed();
    }

    let initial = value_history[0].value;
    let final_value = value_history[value_history.len() - 1].value;
    if initial <= 0.0 {
        return PerformanceSummary::zeroed();
    }

    let total_return = final_value / initial - 1.0;

    let days = (value_history[value_history.len() - 1].date - value_history[0].date).num_days();
    let annualized_return = if days > 0 && final_value > 0.0 {
        (final_value / initial).powf(DAYS_PER_YEAR / days as f64) - 1.0
    } else {
        0.0
    };

    let returns: Vec<f64> = value_history
        .windows(2)
        .map(|w| {
            if w[0].value > 0.0 {
                w[1].value / w[0].value - 1.0
            } else {
                0.0
            }
        })
        .collect();
    let volatility = stddev(&returns) * periods_per_year.sqrt();

    let sharpe_ratio = if volatility > 0.0 {
        (annualized_return - risk_free_rate) / volatility
    } else {
        0.0
    };

    let max_drawdown = max_drawdown(value_history);

    let traded: f64 = trades.iter().map(Trade::gross_value).sum();
    let average_value =
        value_history.iter().map(|p| p.value).sum::<f64>() / value_history.len() as f64;
    let turnover = if average_value > 0.0 {
        traded / average_value
    } else {
        0.0
    };

    PerformanceSummary {
        total_return,
        annualized_return,
        volatility,
        sharpe_ratio,
        max_drawdown,
        turnover,
    }
}

/// Largest running peak-to-trough decline, as a positive fraction.
fn max_drawdown(value_history: &[ValuePoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for point in value_history {
        if point.value > peak {
            peak = point.value;
        } else if peak > 0.0 {
            let dd = (peak - point.value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
