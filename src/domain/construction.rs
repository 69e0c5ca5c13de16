//! Portfolio construction: ranked candidates to capped target weights.
//!
//! Deterministic by contract: composite-score ordering with symbol
//! tie-breaks, equal base weights under a per-name cap, and a single
//! scale-down-and-redistribute pass for the sector cap. Whatever weight
//! cannot be placed after that one pass stays in cash; there is no
//! iterative re-balancing.

use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::pipeline::Candidate;

const UNCLASSIFIED_SECTOR: &str = "Unclassified";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetWeight {
    pub symbol: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorConfig {
    pub max_positions: usize,
    pub min_positions: usize,
    pub max_weight_per_stock: f64,
    pub max_sector_weight: f64,
}

impl Default for ConstructorConfig {
    fn default() -> Self {
        ConstructorConfig {
            max_positions: 20,
            min_positions: 5,
            max_weight_per_stock: 0.10,
            max_sector_weight: 0.30,
        }
    }
}

pub struct PortfolioConstructor {
    config: ConstructorConfig,
}

impl PortfolioConstructor {
    pub fn new(config: ConstructorConfig) -> Self {
        PortfolioConstructor { config }
    }

    /// Build target weights for one rebalance date. The returned vec is in
    /// rank order (best candidate first); the simulator buys in this order.
    ///
    /// Fewer than `min_positions` candidates means a hold-cash round: an
    /// empty target set, so every holding is liquidated into cash.
    pub fn build(&self, candidates: &[Candidate], as_of_date: NaiveDate) -> Vec<TargetWeight> {
        if candidates.len() < self.config.min_positions {
            info!(
                "{as_of_date}: {} candidates below the {} floor, holding cash",
                candidates.len(),
                self.config.min_positions
            );
            return Vec::new();
        }

        let mut ranked: Vec<&Candidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        ranked.truncate(self.config.max_positions);

        let cap = self.config.max_weight_per_stock;
        let n = ranked.len() as f64;
        let base = (1.0 / n).min(cap);

        let mut weights: Vec<f64> = vec![base; ranked.len()];

        // Renormalize toward fully invested without breaching the per-name
        // cap. min() only shrinks, so the sum stays <= 1.
        let sum: f64 = weights.iter().sum();
        if sum > 0.0 && sum < 1.0 {
            let scale = 1.0 / sum;
            for w in &mut weights {
                *w = (*w * scale).min(cap);
            }
        }

        self.enforce_sector_cap(&ranked, &mut weights);

        let total: f64 = weights.iter().sum();
        debug!(
            "{as_of_date}: {} targets, {:.1}% invested",
            ranked.len(),
            total * 100.0
        );

        ranked
            .iter()
            .zip(weights)
            .map(|(c, weight)| TargetWeight {
                symbol: c.symbol.clone(),
                weight,
            })
            .collect()
    }

    /// One deterministic pass: scale violating sectors down to the cap,
    /// then hand the freed weight to names in compliant sectors, respecting
    /// both caps. Residual excess is left uninvested.
    fn enforce_sector_cap(&self, ranked: &[&Candidate], weights: &mut [f64]) {
        let sector_cap = self.config.max_sector_weight;
        let name_cap = self.config.max_weight_per_stock;

        let sectors: Vec<String> = ranked
            .iter()
            .map(|c| {
                c.snapshot
                    .financials
                    .sector
                    .clone()
                    .unwrap_or_else(|| UNCLASSIFIED_SECTOR.to_string())
            })
            .collect();

        let mut sector_sums: HashMap<&str, f64> = HashMap::new();
        for (sector, weight) in sectors.iter().zip(weights.iter()) {
            *sector_sums.entry(sector.as_str()).or_default() += *weight;
        }

        let violating: Vec<&str> = sector_sums
            .iter()
            .filter(|(_, sum)| **sum > sector_cap)
            .map(|(sector, _)| *sector)
            .collect();
        if violating.is_empty() {
            return;
        }

        let mut freed = 0.0;
        for (i, sector) in sectors.iter().enumerate() {
            if violating.contains(&sector.as_str()) {
                let sum = sector_sums[sector.as_str()];
                let scaled = weights[i] * sector_cap / sum;
                freed += weights[i] - scaled;
                weights[i] = scaled;
            }
        }

        // Receivers: names in sectors that were already compliant.
        let receiver_total: f64 = sectors
            .iter()
            .zip(weights.iter())
            .filter(|(sector, _)| !violating.contains(&sector.as_str()))
            .map(|(_, w)| *w)
            .sum();
        if receiver_total <= 0.0 {
            return;
        }

        let mut running_sums: HashMap<&str, f64> = HashMap::new();
        for (sector, weight) in sectors.iter().zip(weights.iter()) {
            *running_sums.entry(sector.as_str()).or_default() += *weight;
        }

        for (i, sector) in sectors.iter().enumerate() {
            if violating.contains(&sector.as_str()) {
                continue;
            }
            let share = freed * weights[i] / receiver_total;
            let name_headroom = (name_cap - weights[i]).max(0.0);
            let sector_headroom = (sector_cap - running_sums[sector.as_str()]).max(0.0);
            let add = share.min(name_headroom).min(sector_headroom);
            weights[i] += add;
            *running_sums.entry(sector.as_str()).or_default() += add;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::financials::{Financials, Price};
    use crate::domain::pipeline::margin_of_safety::Rating;
    use crate::domain::snapshot::AsOfSnapshot;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn candidate(symbol: &str, score: f64, sector: &str) -> Candidate {
        Candidate {
            symbol: symbol.into(),
            composite_score: score,
            rating: Rating::Watch,
            snapshot: AsOfSnapshot {
                symbol: symbol.into(),
                as_of_date: d(2020, 6, 30),
                financials: Financials {
                    symbol: symbol.into(),
                    sector: Some(sector.into()),
                    ..Default::default()
                },
                price: Price {
                    symbol: symbol.into(),
                    quote_date: d(2020, 6, 26),
                    close: 10.0,
                },
            },
        }
    }

    fn spread_candidates(n: usize) -> Vec<Candidate> {
        // Rotate across four sectors so no sector cap binds by default.
        let sectors = ["Industrials", "Tech", "Health", "Energy"];
        (0..n)
            .map(|i| {
                candidate(
                    &format!("SYM{i:02}"),
                    90.0 - i as f64,
                    sectors[i % sectors.len()],
                )
            })
            .collect()
    }

    fn constructor() -> PortfolioConstructor {
        PortfolioConstructor::new(ConstructorConfig::default())
    }

    #[test]
    fn equal_weights_for_full_book() {
        let targets = constructor().build(&spread_candidates(20), d(2020, 6, 30));
        assert_eq!(targets.len(), 20);
        for t in &targets {
            assert_relative_eq!(t.weight, 0.05, epsilon = 1e-12);
        }
    }

    #[test]
    fn ranked_order_preserved() {
        let targets = constructor().build(&spread_candidates(8), d(2020, 6, 30));
        let symbols: Vec<&str> = targets.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(
            symbols,
            ["SYM00", "SYM01", "SYM02", "SYM03", "SYM04", "SYM05", "SYM06", "SYM07"]
        );
    }

    #[test]
    fn ties_break_by_symbol() {
        let mut candidates = spread_candidates(6);
        for c in &mut candidates {
            c.composite_score = 75.0;
        }
        let targets = constructor().build(&candidates, d(2020, 6, 30));
        let symbols: Vec<&str> = targets.iter().map(|t| t.symbol.as_str()).collect();
        let mut sorted = symbols.clone();
        sorted.sort();
        assert_eq!(symbols, sorted);
    }

    #[test]
    fn deterministic_across_runs() {
        let candidates = spread_candidates(12);
        let a = constructor().build(&candidates, d(2020, 6, 30));
        let b = constructor().build(&candidates, d(2020, 6, 30));
        assert_eq!(a, b);
    }

    #[test]
    fn truncates_to_max_positions() {
        let targets = constructor().build(&spread_candidates(30), d(2020, 6, 30));
        assert_eq!(targets.len(), 20);
        // The weakest scores fell off the end.
        assert!(targets.iter().all(|t| t.symbol != "SYM29"));
    }

    #[test]
    fn below_min_positions_holds_cash() {
        let targets = constructor().build(&spread_candidates(3), d(2020, 6, 30));
        assert!(targets.is_empty());
    }

    #[test]
    fn per_name_cap_leaves_residual_cash() {
        // Six names: base 1/6 > 10% cap, so all clip to the cap and the
        // book tops out at 60% invested.
        let targets = constructor().build(&spread_candidates(6), d(2020, 6, 30));
        let total: f64 = targets.iter().map(|t| t.weight).sum();
        for t in &targets {
            assert!(t.weight <= 0.10 + 1e-12);
        }
        assert_relative_eq!(total, 0.60, epsilon = 1e-12);
    }

    #[test]
    fn weights_sum_at_most_one() {
        for n in [5, 8, 12, 20, 30] {
            let targets = constructor().build(&spread_candidates(n), d(2020, 6, 30));
            let total: f64 = targets.iter().map(|t| t.weight).sum();
            assert!(total <= 1.0 + 1e-9, "n={n} total={total}");
        }
    }

    #[test]
    fn sector_cap_scales_down_and_redistributes() {
        // Eight of twenty names in one sector: 40% pre-cap, scaled to 30%,
        // with the freed 10% spread over the other twelve names.
        let mut candidates = Vec::new();
        for i in 0..8 {
            candidates.push(candidate(&format!("TEC{i:02}"), 90.0 - i as f64, "Tech"));
        }
        for i in 0..12 {
            candidates.push(candidate(
                &format!("OTH{i:02}"),
                70.0 - i as f64,
                ["Industrials", "Health", "Energy"][i % 3],
            ));
        }
        let targets = constructor().build(&candidates, d(2020, 6, 30));

        let tech_total: f64 = targets
            .iter()
            .filter(|t| t.symbol.starts_with("TEC"))
            .map(|t| t.weight)
            .sum();
        assert_relative_eq!(tech_total, 0.30, epsilon = 1e-9);

        for t in &targets {
            assert!(t.weight <= 0.10 + 1e-12);
        }

        let other: f64 = targets
            .iter()
            .filter(|t| t.symbol.starts_with("OTH"))
            .map(|t| t.weight)
            .sum();
        // 60% base plus the redistributed 10%.
        assert_relative_eq!(other, 0.70, epsilon = 1e-9);
    }

    #[test]
    fn residual_excess_stays_in_cash_after_one_pass() {
        // Every name in one sector: nothing can receive the freed weight.
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| candidate(&format!("TEC{i:02}"), 90.0 - i as f64, "Tech"))
            .collect();
        let targets = constructor().build(&candidates, d(2020, 6, 30));
        let total: f64 = targets.iter().map(|t| t.weight).sum();
        assert_relative_eq!(total, 0.30, epsilon = 1e-9);
    }

    #[test]
    fn missing_sector_grouped_as_unclassified() {
        let mut candidates = spread_candidates(5);
        for c in &mut candidates {
            c.snapshot.financials.sector = None;
        }
        // All five land in one implicit sector; the cap binds.
        let targets = constructor().build(&candidates, d(2020, 6, 30));
        let total: f64 = targets.iter().map(|t| t.weight).sum();
        assert_relative_eq!(total, 0.30, epsilon = 1e-9);
    }
}
