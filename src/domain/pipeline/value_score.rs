//! Gate 4: value-metric scoring.
//!
//! Five weighted sub-scores on a 0-100 scale. Each metric is scored
//! against an absolute band table; when the sector cross-section has
//! enough peers, the absolute score is blended with the sector-relative
//! percentile. The gate only excludes below the configured threshold —
//! above it, the composite is a ranking signal, not a filter.

use crate::domain::financials::Financials;
use crate::domain::pipeline::tiers::{tiered_score, Better};
use crate::domain::sector::{SectorMetric, SectorStats};

pub const WEIGHT_EV_EBIT: f64 = 0.35;
pub const WEIGHT_FCF_YIELD: f64 = 0.25;
pub const WEIGHT_OWNER_EARNINGS_YIELD: f64 = 0.20;
pub const WEIGHT_EARNINGS_QUALITY_YIELD: f64 = 0.10;
pub const WEIGHT_SHAREHOLDER_YIELD: f64 = 0.10;

const EV_EBIT_BANDS: &[(f64, f64)] = &[
    (4.0, 100.0),
    (6.0, 90.0),
    (8.0, 75.0),
    (10.0, 60.0),
    (12.0, 45.0),
    (15.0, 30.0),
];
const EV_EBIT_FLOOR: f64 = 15.0;

const FCF_YIELD_BANDS: &[(f64, f64)] = &[
    (0.12, 100.0),
    (0.09, 85.0),
    (0.07, 70.0),
    (0.05, 55.0),
    (0.03, 40.0),
    (0.015, 25.0),
];
const FCF_YIELD_FLOOR: f64 = 10.0;

const OWNER_YIELD_BANDS: &[(f64, f64)] = &[
    (0.12, 100.0),
    (0.09, 85.0),
    (0.06, 65.0),
    (0.04, 45.0),
    (0.02, 25.0),
];
const OWNER_YIELD_FLOOR: f64 = 10.0;

const EQY_BANDS: &[(f64, f64)] = &[(0.10, 100.0), (0.07, 80.0), (0.05, 60.0), (0.03, 40.0)];
const EQY_FLOOR: f64 = 15.0;

const SHY_BANDS: &[(f64, f64)] = &[(0.08, 100.0), (0.05, 80.0), (0.03, 60.0), (0.015, 40.0)];
const SHY_FLOOR: f64 = 15.0;

/// Raw valuation inputs, shared with the sector cross-section builder so
/// percentiles rank exactly what the bands score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawValueMetrics {
    pub ev_ebit: Option<f64>,
    pub fcf_yield: Option<f64>,
    pub owner_earnings_yield: Option<f64>,
    pub earnings_quality_yield: Option<f64>,
    pub shareholder_yield: Option<f64>,
}

impl RawValueMetrics {
    pub fn for_each<F: FnMut(SectorMetric, f64)>(&self, mut f: F) {
        if let Some(v) = self.ev_ebit {
            f(SectorMetric::EvEbit, v);
        }
        if let Some(v) = self.fcf_yield {
            f(SectorMetric::FcfYield, v);
        }
        if let Some(v) = self.owner_earnings_yield {
            f(SectorMetric::OwnerEarningsYield, v);
        }
        if let Some(v) = self.earnings_quality_yield {
            f(SectorMetric::EarningsQualityYield, v);
        }
        if let Some(v) = self.shareholder_yield {
            f(SectorMetric::ShareholderYield, v);
        }
    }
}

/// Extract the raw metrics from a fundamental record.
pub fn raw_metrics(fin: &Financials) -> RawValueMetrics {
    let cap = match fin.market_cap {
        Some(cap) if cap > 0.0 => cap,
        _ => return RawValueMetrics::default(),
    };

    let ev_ebit = match (fin.enterprise_value, fin.ebit) {
        (Some(ev), Some(ebit)) if ebit > 0.0 => Some(ev / ebit),
        _ => None,
    };

    // 5-year normalized FCF: mean of the history values, scalar fallback.
    let fcf_values: Vec<f64> = fin
        .history
        .iter()
        .take(5)
        .filter_map(|p| p.free_cash_flow)
        .collect();
    let normalized_fcf = if fcf_values.is_empty() {
        fin.free_cash_flow
    } else {
        Some(fcf_values.iter().sum::<f64>() / fcf_values.len() as f64)
    };
    let fcf_yield = normalized_fcf.map(|fcf| fcf / cap);

    let owner_earnings_yield = fin.owner_earnings_or_proxy().map(|oe| oe / cap);

    // Cash-backed earnings yield: the slice of net income that operating
    // cash flow actually covers.
    let earnings_quality_yield = match (fin.net_income, fin.operating_cash_flow) {
        (Some(ni), Some(ocf)) => Some(ni.min(ocf) / cap),
        (Some(ni), None) => Some(ni / cap),
        _ => None,
    };

    let shareholder_yield = match (fin.dividends_paid, fin.buybacks) {
        (None, None) => None,
        (dividends, buybacks) => {
            Some((dividends.unwrap_or(0.0) + buybacks.unwrap_or(0.0)) / cap)
        }
    };

    RawValueMetrics {
        ev_ebit,
        fcf_yield,
        owner_earnings_yield,
        earnings_quality_yield,
        shareholder_yield,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueOutcome {
    pub passed: bool,
    pub reason: String,
    /// Weighted composite on a 0-100 scale.
    pub composite: f64,
}

/// Score one security. `relative_blend` is the sector-percentile fraction
/// of each sub-score (0.30 means 70/30 absolute/relative).
pub fn evaluate(
    fin: &Financials,
    sector: &SectorStats,
    relative_blend: f64,
    score_threshold: f64,
) -> ValueOutcome {
    let metrics = raw_metrics(fin);

    let composite = composite_score(&metrics, fin.sector.as_deref(), sector, relative_blend);

    if composite < score_threshold {
        ValueOutcome {
            passed: false,
            reason: "below_score_threshold".into(),
            composite,
        }
    } else {
        ValueOutcome {
            passed: true,
            reason: "pass".into(),
            composite,
        }
    }
}

fn composite_score(
    metrics: &RawValueMetrics,
    sector_name: Option<&str>,
    sector: &SectorStats,
    relative_blend: f64,
) -> f64 {
    let parts = [
        (
            metrics.ev_ebit,
            SectorMetric::EvEbit,
            Better::Lower,
            EV_EBIT_BANDS,
            EV_EBIT_FLOOR,
            WEIGHT_EV_EBIT,
        ),
        (
            metrics.fcf_yield,
            SectorMetric::FcfYield,
            Better::Higher,
            FCF_YIELD_BANDS,
            FCF_YIELD_FLOOR,
            WEIGHT_FCF_YIELD,
        ),
        (
            metrics.owner_earnings_yield,
            SectorMetric::OwnerEarningsYield,
            Better::Higher,
            OWNER_YIELD_BANDS,
            OWNER_YIELD_FLOOR,
            WEIGHT_OWNER_EARNINGS_YIELD,
        ),
        (
            metrics.earnings_quality_yield,
            SectorMetric::EarningsQualityYield,
            Better::Higher,
            EQY_BANDS,
            EQY_FLOOR,
            WEIGHT_EARNINGS_QUALITY_YIELD,
        ),
        (
            metrics.shareholder_yield,
            SectorMetric::ShareholderYield,
            Better::Higher,
            SHY_BANDS,
            SHY_FLOOR,
            WEIGHT_SHAREHOLDER_YIELD,
        ),
    ];

    let mut total = 0.0;
    for (value, metric, better, bands, floor, weight) in parts {
        // A missing metric contributes nothing: absence is already paid
        // for once at the reliability gate, here it just cannot earn.
        let Some(value) = value else { continue };
        let absolute = tiered_score(value, better, bands, floor);
        let blended = match sector_name.and_then(|s| sector.percentile(s, metric, value)) {
            Some(percentile) => {
                (1.0 - relative_blend) * absolute + relative_blend * percentile
            }
            None => absolute,
        };
        total += weight * blended;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::financials::FiscalPeriod;
    use crate::domain::sector::SectorStatsBuilder;
    use approx::assert_relative_eq;

    fn deep_value() -> Financials {
        Financials {
            symbol: "ACME".into(),
            sector: Some("Industrials".into()),
            market_cap: Some(1.0e9),
            enterprise_value: Some(1.1e9),
            ebit: Some(2.75e8),           // EV/EBIT = 4.0
            free_cash_flow: Some(1.3e8),  // 13% yield
            owner_earnings: Some(1.25e8), // 12.5% yield
            net_income: Some(1.1e8),
            operating_cash_flow: Some(1.2e8), // quality yield 11%
            dividends_paid: Some(5.0e7),
            buybacks: Some(3.5e7), // shareholder yield 8.5%
            ..Default::default()
        }
    }

    #[test]
    fn raw_metrics_computed() {
        let m = raw_metrics(&deep_value());
        assert_relative_eq!(m.ev_ebit.unwrap(), 4.0, epsilon = 1e-9);
        assert_relative_eq!(m.fcf_yield.unwrap(), 0.13, epsilon = 1e-9);
        assert_relative_eq!(m.owner_earnings_yield.unwrap(), 0.125, epsilon = 1e-9);
        assert_relative_eq!(m.earnings_quality_yield.unwrap(), 0.11, epsilon = 1e-9);
        assert_relative_eq!(m.shareholder_yield.unwrap(), 0.085, epsilon = 1e-9);
    }

    #[test]
    fn deep_value_scores_top_band_everywhere() {
        let out = evaluate(&deep_value(), &SectorStats::empty(), 0.30, 40.0);
        assert!(out.passed);
        assert_relative_eq!(out.composite, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn fcf_yield_normalized_over_history() {
        let mut fin = deep_value();
        fin.history = vec![
            FiscalPeriod {
                free_cash_flow: Some(1.0e8),
                ..Default::default()
            },
            FiscalPeriod {
                free_cash_flow: Some(6.0e7),
                ..Default::default()
            },
        ];
        let m = raw_metrics(&fin);
        assert_relative_eq!(m.fcf_yield.unwrap(), 0.08, epsilon = 1e-9);
    }

    #[test]
    fn negative_ebit_gives_no_multiple() {
        let mut fin = deep_value();
        fin.ebit = Some(-1.0e7);
        assert!(raw_metrics(&fin).ev_ebit.is_none());
    }

    #[test]
    fn quality_yield_caps_at_cash_flow() {
        let mut fin = deep_value();
        fin.net_income = Some(2.0e8);
        fin.operating_cash_flow = Some(5.0e7);
        let m = raw_metrics(&fin);
        assert_relative_eq!(m.earnings_quality_yield.unwrap(), 0.05, epsilon = 1e-9);
    }

    #[test]
    fn expensive_stock_fails_threshold() {
        let fin = Financials {
            symbol: "DEAR".into(),
            market_cap: Some(1.0e10),
            enterprise_value: Some(1.2e10),
            ebit: Some(3.0e8), // EV/EBIT = 40
            free_cash_flow: Some(5.0e7),
            net_income: Some(4.0e7),
            operating_cash_flow: Some(4.5e7),
            ..Default::default()
        };
        let out = evaluate(&fin, &SectorStats::empty(), 0.30, 40.0);
        assert!(!out.passed);
        assert_eq!(out.reason, "below_score_threshold");
    }

    #[test]
    fn missing_metric_earns_nothing() {
        let mut fin = deep_value();
        fin.dividends_paid = None;
        fin.buybacks = None;
        let out = evaluate(&fin, &SectorStats::empty(), 0.30, 40.0);
        assert_relative_eq!(out.composite, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn sector_percentile_blends_in() {
        let mut builder = SectorStatsBuilder::default();
        // Peer EV/EBIT cross-section; 4.0 tops it.
        for v in [4.0, 8.0, 12.0, 16.0, 20.0] {
            builder.add_metric("Industrials", SectorMetric::EvEbit, v);
        }
        let stats = builder.build(3, 0.30);

        let mut fin = deep_value();
        // Isolate the EV/EBIT sub-score.
        fin.free_cash_flow = None;
        fin.owner_earnings = None;
        fin.net_income = None;
        fin.operating_cash_flow = None;
        fin.dividends_paid = None;
        fin.buybacks = None;

        let blended = evaluate(&fin, &stats, 0.30, 0.0);
        let absolute_only = evaluate(&fin, &SectorStats::empty(), 0.30, 0.0);

        // Absolute is already 100; the 90th-percentile rank drags the
        // blend down a touch. 0.7*100 + 0.3*90 = 97, weighted 0.35.
        assert_relative_eq!(absolute_only.composite, 35.0, epsilon = 1e-9);
        assert_relative_eq!(blended.composite, 0.35 * 97.0, epsilon = 1e-9);
    }

    #[test]
    fn blend_fraction_zero_ignores_sector() {
        let mut builder = SectorStatsBuilder::default();
        for v in [4.0, 8.0, 12.0, 16.0, 20.0] {
            builder.add_metric("Industrials", SectorMetric::EvEbit, v);
        }
        let stats = builder.build(3, 0.30);
        let out_rel = evaluate(&deep_value(), &stats, 0.0, 40.0);
        let out_abs = evaluate(&deep_value(), &SectorStats::empty(), 0.0, 40.0);
        assert_relative_eq!(out_rel.composite, out_abs.composite, epsilon = 1e-9);
    }

    #[test]
    fn no_market_cap_scores_zero() {
        let fin = Financials {
            symbol: "NOCAP".into(),
            ..Default::default()
        };
        let out = evaluate(&fin, &SectorStats::empty(), 0.30, 40.0);
        assert!(!out.passed);
        assert_relative_eq!(out.composite, 0.0, epsilon = 1e-9);
    }
}
