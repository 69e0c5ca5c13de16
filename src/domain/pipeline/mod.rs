//! Five-stage eligibility pipeline.
//!
//! Stages run in order; a rejection stops the ladder and later stages are
//! never consulted. Every stage leaves an [`EligibilityVerdict`] behind for
//! the audit trail, pass or fail. A security becomes a [`Candidate`] only
//! after clearing all five gates.

pub mod accounting;
pub mod margin_of_safety;
pub mod reliability;
pub mod risk;
pub mod tiers;
pub mod value_score;

use serde::Serialize;

use crate::domain::sector::SectorStats;
use crate::domain::snapshot::AsOfSnapshot;
use self::margin_of_safety::{MosConfig, Rating};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateStage {
    InputReliability,
    AccountingQuality,
    RiskConstraint,
    ValueScoring,
    MarginOfSafety,
}

impl std::fmt::Display for GateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GateStage::InputReliability => "input_reliability",
            GateStage::AccountingQuality => "accounting_quality",
            GateStage::RiskConstraint => "risk_constraint",
            GateStage::ValueScoring => "value_scoring",
            GateStage::MarginOfSafety => "margin_of_safety",
        };
        write!(f, "{name}")
    }
}

/// One gate's decision for one security on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityVerdict {
    pub symbol: String,
    pub stage: GateStage,
    pub passed: bool,
    pub reason: String,
    pub score: Option<f64>,
}

/// A security that cleared every gate. `composite_score` (from the value
/// gate) drives portfolio ranking; ties break by symbol.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub symbol: String,
    pub composite_score: f64,
    pub rating: Rating,
    pub snapshot: AsOfSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub max_missing_core_fields: usize,
    pub score_threshold: f64,
    /// Sector-percentile fraction of each valuation sub-score.
    pub relative_blend: f64,
    /// Sector leverage z-cut; `None` disables the check.
    pub sector_z_cut: Option<f64>,
    pub mos: MosConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_missing_core_fields: 2,
            score_threshold: 40.0,
            relative_blend: 0.30,
            sector_z_cut: None,
            mos: MosConfig::default(),
        }
    }
}

/// Full evaluation record for one security on one date.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub symbol: String,
    pub verdicts: Vec<EligibilityVerdict>,
    pub candidate: Option<Candidate>,
}

impl PipelineOutcome {
    /// The stage that rejected, if any.
    pub fn rejected_at(&self) -> Option<&EligibilityVerdict> {
        self.verdicts.iter().find(|v| !v.passed)
    }
}

pub struct EligibilityPipeline {
    config: PipelineConfig,
}

impl EligibilityPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        EligibilityPipeline { config }
    }

    /// Run the gates in order against one snapshot.
    pub fn evaluate(&self, snapshot: &AsOfSnapshot, sector: &SectorStats) -> PipelineOutcome {
        let symbol = snapshot.symbol.clone();
        let fin = &snapshot.financials;
        let mut verdicts = Vec::with_capacity(5);

        let reliability = reliability::evaluate(fin, self.config.max_missing_core_fields);
        verdicts.push(EligibilityVerdict {
            symbol: symbol.clone(),
            stage: GateStage::InputReliability,
            passed: reliability.passed,
            reason: reliability.reason,
            score: None,
        });
        if !reliability.passed {
            return PipelineOutcome {
                symbol,
                verdicts,
                candidate: None,
            };
        }

        let accounting = accounting::evaluate(fin);
        verdicts.push(EligibilityVerdict {
            symbol: symbol.clone(),
            stage: GateStage::AccountingQuality,
            passed: accounting.passed,
            reason: accounting.reason.clone(),
            score: Some(f64::from(accounting.soundness)),
        });
        if !accounting.passed {
            return PipelineOutcome {
                symbol,
                verdicts,
                candidate: None,
            };
        }

        let risk = risk::evaluate(fin, sector, self.config.sector_z_cut);
        verdicts.push(EligibilityVerdict {
            symbol: symbol.clone(),
            stage: GateStage::RiskConstraint,
            passed: risk.passed,
            reason: risk.reason.clone(),
            score: Some(risk.risk_score),
        });
        if !risk.passed {
            return PipelineOutcome {
                symbol,
                verdicts,
                candidate: None,
            };
        }

        let value = value_score::evaluate(
            fin,
            sector,
            self.config.relative_blend,
            self.config.score_threshold,
        );
        verdicts.push(EligibilityVerdict {
            symbol: symbol.clone(),
            stage: GateStage::ValueScoring,
            passed: value.passed,
            reason: value.reason.clone(),
            score: Some(value.composite),
        });
        if !value.passed {
            return PipelineOutcome {
                symbol,
                verdicts,
                candidate: None,
            };
        }

        let mos = margin_of_safety::evaluate(
            snapshot,
            accounting.soundness,
            risk.risk_score,
            &self.config.mos,
        );
        verdicts.push(EligibilityVerdict {
            symbol: symbol.clone(),
            stage: GateStage::MarginOfSafety,
            passed: mos.passed,
            reason: mos.reason.clone(),
            score: Some(mos.margin_of_safety),
        });
        if !mos.passed {
            return PipelineOutcome {
                symbol,
                verdicts,
                candidate: None,
            };
        }

        let candidate = Candidate {
            symbol: symbol.clone(),
            composite_score: value.composite,
            rating: mos.rating,
            snapshot: snapshot.clone(),
        };
        PipelineOutcome {
            symbol,
            verdicts,
            candidate: Some(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::financials::{Financials, FiscalPeriod, Price};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn period(year: i32, revenue: f64, net_income: f64, total_assets: f64) -> FiscalPeriod {
        FiscalPeriod {
            fiscal_year: year,
            revenue: Some(revenue),
            net_income: Some(net_income),
            operating_margin: Some(12.0),
            net_margin: Some(8.0),
            total_assets: Some(total_assets),
            free_cash_flow: Some(net_income),
            debt_ratio: Some(40.0),
            current_ratio: Some(1.8),
        }
    }

    /// A snapshot that clears every gate with the default config.
    fn strong_snapshot(symbol: &str) -> AsOfSnapshot {
        AsOfSnapshot {
            symbol: symbol.into(),
            as_of_date: d(2020, 6, 30),
            financials: Financials {
                symbol: symbol.into(),
                report_date: d(2020, 3, 31),
                sector: Some("Industrials".into()),
                market_cap: Some(1.0e9),
                shares_outstanding: Some(1.0e8),
                roe: Some(15.0),
                roa: Some(8.0),
                operating_margin: Some(12.0),
                net_margin: Some(8.0),
                debt_ratio: Some(40.0),
                debt_to_equity: Some(0.8),
                current_ratio: Some(1.8),
                revenue: Some(2.0e9),
                net_income: Some(1.6e8),
                ebit: Some(2.2e8),
                enterprise_value: Some(1.1e9),
                free_cash_flow: Some(1.3e8),
                owner_earnings: Some(1.25e8),
                operating_cash_flow: Some(1.7e8),
                dividends_paid: Some(4.0e7),
                buybacks: Some(2.0e7),
                payout_ratio: Some(35.0),
                eps: Some(1.6),
                eps_growth: Some(6.0),
                history: vec![
                    period(2019, 2.00e9, 1.60e8, 3.00e9),
                    period(2018, 1.90e9, 1.50e8, 2.99e9),
                    period(2017, 1.80e9, 1.40e8, 2.98e9),
                    period(2016, 1.70e9, 1.30e8, 2.97e9),
                    period(2015, 1.60e9, 1.20e8, 2.96e9),
                ],
            },
            price: Price {
                symbol: symbol.into(),
                quote_date: d(2020, 6, 26),
                close: 10.0,
            },
        }
    }

    #[test]
    fn strong_snapshot_becomes_candidate() {
        let pipeline = EligibilityPipeline::new(PipelineConfig::default());
        let out = pipeline.evaluate(&strong_snapshot("ACME"), &SectorStats::empty());
        assert_eq!(out.verdicts.len(), 5);
        assert!(out.verdicts.iter().all(|v| v.passed));
        let candidate = out.candidate.expect("should clear all gates");
        assert_eq!(candidate.symbol, "ACME");
        assert!(candidate.composite_score > 40.0);
    }

    #[test]
    fn rejection_stops_the_ladder() {
        let pipeline = EligibilityPipeline::new(PipelineConfig::default());
        let mut snapshot = strong_snapshot("ACME");
        snapshot.financials.market_cap = None;
        let out = pipeline.evaluate(&snapshot, &SectorStats::empty());
        assert_eq!(out.verdicts.len(), 1);
        assert!(out.candidate.is_none());
        let rejected = out.rejected_at().unwrap();
        assert_eq!(rejected.stage, GateStage::InputReliability);
    }

    #[test]
    fn high_debt_rejected_at_risk_stage_with_audit_reason() {
        let pipeline = EligibilityPipeline::new(PipelineConfig::default());
        let mut snapshot = strong_snapshot("ACME");
        snapshot.financials.debt_ratio = Some(150.0);
        let out = pipeline.evaluate(&snapshot, &SectorStats::empty());
        let rejected = out.rejected_at().unwrap();
        assert_eq!(rejected.stage, GateStage::RiskConstraint);
        assert!(rejected.reason.contains("high_debt_ratio"));
        assert!(out.candidate.is_none());
    }

    #[test]
    fn overpriced_snapshot_fails_mos_gate() {
        let pipeline = EligibilityPipeline::new(PipelineConfig::default());
        let mut snapshot = strong_snapshot("ACME");
        snapshot.price.close = 500.0;
        // Keep the valuation gate's market cap untouched so the rejection
        // lands on the margin-of-safety stage.
        let out = pipeline.evaluate(&snapshot, &SectorStats::empty());
        let rejected = out.rejected_at().unwrap();
        assert_eq!(rejected.stage, GateStage::MarginOfSafety);
        assert_eq!(rejected.reason, "insufficient_margin_of_safety");
    }

    #[test]
    fn verdicts_carry_scores() {
        let pipeline = EligibilityPipeline::new(PipelineConfig::default());
        let out = pipeline.evaluate(&strong_snapshot("ACME"), &SectorStats::empty());
        let by_stage = |stage: GateStage| {
            out.verdicts
                .iter()
                .find(|v| v.stage == stage)
                .unwrap()
                .score
        };
        assert!(by_stage(GateStage::AccountingQuality).unwrap() >= 6.0);
        assert!(by_stage(GateStage::RiskConstraint).unwrap() > 0.9);
        assert!(by_stage(GateStage::ValueScoring).unwrap() > 40.0);
        assert!(by_stage(GateStage::MarginOfSafety).unwrap() >= 0.10);
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(GateStage::InputReliability.to_string(), "input_reliability");
        assert_eq!(GateStage::MarginOfSafety.to_string(), "margin_of_safety");
    }
}
