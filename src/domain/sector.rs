//! Per-round sector cross-section statistics.
//!
//! Built once per rebalance date from that round's snapshots, then shared
//! read-only with the pipeline stages: the risk gate uses the leverage
//! z-score, the valuation gate blends absolute scores with sector-relative
//! percentiles. Nothing here survives the round.

use std::collections::HashMap;

/// Valuation metrics tracked per sector for percentile ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectorMetric {
    EvEbit,
    FcfYield,
    OwnerEarningsYield,
    EarningsQualityYield,
    ShareholderYield,
}

impl SectorMetric {
    /// EV/EBIT is a multiple: lower beats peers. Yields rank the other way.
    fn lower_is_better(self) -> bool {
        matches!(self, SectorMetric::EvEbit)
    }
}

#[derive(Debug, Default)]
pub struct SectorStatsBuilder {
    debt_ratios: HashMap<String, Vec<f64>>,
    metrics: HashMap<(String, SectorMetric), Vec<f64>>,
}

impl SectorStatsBuilder {
    pub fn add_debt_ratio(&mut self, sector: &str, debt_ratio: f64) {
        if debt_ratio.is_finite() {
            self.debt_ratios
                .entry(sector.to_string())
                .or_default()
                .push(debt_ratio);
        }
    }

    pub fn add_metric(&mut self, sector: &str, metric: SectorMetric, value: f64) {
        if value.is_finite() {
            self.metrics
                .entry((sector.to_string(), metric))
                .or_default()
                .push(value);
        }
    }

    pub fn build(self, min_peers: usize, std_fraction: f64) -> SectorStats {
        let mut debt_ratios = self.debt_ratios;
        for values in debt_ratios.values_mut() {
            values.sort_by(|a, b| a.total_cmp(b));
        }
        let mut metrics = self.metrics;
        for values in metrics.values_mut() {
            values.sort_by(|a, b| a.total_cmp(b));
        }
        SectorStats {
            debt_ratios,
            metrics,
            min_peers: min_peers.max(2),
            std_fraction,
        }
    }
}

#[derive(Debug)]
pub struct SectorStats {
    debt_ratios: HashMap<String, Vec<f64>>,
    metrics: HashMap<(String, SectorMetric), Vec<f64>>,
    min_peers: usize,
    std_fraction: f64,
}

impl SectorStats {
    /// Empty statistics: every query answers `None`, callers fall back to
    /// absolute scoring and the z-cut check is skipped.
    pub fn empty() -> Self {
        SectorStatsBuilder::default().build(2, 0.30)
    }

    /// Leverage z-score for `debt_ratio` against its sector.
    ///
    /// Positive means less levered than the sector median. The sample
    /// standard deviation is used when the cross-section yields one;
    /// otherwise it is approximated as `std_fraction` of the median.
    /// `None` when the sector has too few peers for the check to mean much.
    pub fn debt_z_score(&self, sector: &str, debt_ratio: f64) -> Option<f64> {
        let values = self.debt_ratios.get(sector)?;
        if values.len() < self.min_peers {
            return None;
        }
        let median = sorted_median(values);
        let std = sample_std(values).filter(|s| *s > f64::EPSILON).unwrap_or_else(|| {
            (self.std_fraction * median.abs()).max(f64::EPSILON)
        });
        Some((median - debt_ratio) / std)
    }

    /// Percentile rank in [0, 100]: the share of sector peers this value
    /// beats, oriented so higher is always better. `None` below the peer
    /// floor.
    pub fn percentile(&self, sector: &str, metric: SectorMetric, value: f64) -> Option<f64> {
        let values = self.metrics.get(&(sector.to_string(), metric))?;
        if values.len() < self.min_peers || !value.is_finite() {
            return None;
        }
        let below = values.partition_point(|v| *v < value);
        let ties = values[below..].iter().take_while(|v| **v == value).count();
        // Midrank for ties keeps the measure symmetric.
        let rank = below as f64 + ties as f64 / 2.0;
        let pct = 100.0 * rank / values.len() as f64;
        Some(if metric.lower_is_better() {
            100.0 - pct
        } else {
            pct
        })
    }
}

fn sorted_median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}
