//! Backtest orchestration: the rebalance-date loop.
//!
//! Dates run strictly in sequence; inside one date, snapshot collection
//! and pipeline evaluation fan out across a worker pool. Per-symbol
//! failures are skipped without touching the rest of the round. A
//! cancellation flag stops the scheduling of further dates; history
//! recorded so far stays valid.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::config::BacktestConfig;
use crate::domain::construction::PortfolioConstructor;
use crate::domain::error::ValuesimError;
use crate::domain::ledger::Ledger;
use crate::domain::performance::{analyze, BacktestResult};
use crate::domain::pipeline::margin_of_safety::Rating;
use crate::domain::pipeline::{value_score, Candidate, EligibilityPipeline};
use crate::domain::rebalance::{MissedBuy, RebalanceSimulator};
use crate::domain::retry::RetryPolicy;
use crate::domain::schedule::rebalance_dates;
use crate::domain::sector::{SectorStats, SectorStatsBuilder};
use crate::domain::snapshot::{AsOfSnapshot, TemporalDataGate};
use crate::ports::data_port::DataProvider;

pub struct BacktestOrchestrator {
    config: BacktestConfig,
    gate: TemporalDataGate,
    pipeline: EligibilityPipeline,
    constructor: PortfolioConstructor,
    simulator: RebalanceSimulator,
    cancel: Arc<AtomicBool>,
}

impl BacktestOrchestrator {
    pub fn new(config: BacktestConfig, provider: Arc<dyn DataProvider>) -> Self {
        Self::with_retry(config, provider, RetryPolicy::default())
    }

    pub fn with_retry(
        config: BacktestConfig,
        provider: Arc<dyn DataProvider>,
        retry: RetryPolicy,
    ) -> Self {
        let gate = TemporalDataGate::new(
            provider,
            config.financial_lag_days,
            config.price_lag_days,
            retry,
        );
        let pipeline = EligibilityPipeline::new(config.pipeline_config());
        let constructor = PortfolioConstructor::new(config.constructor_config());
        let simulator = RebalanceSimulator::new(config.execution_config());
        BacktestOrchestrator {
            config,
            gate,
            pipeline,
            constructor,
            simulator,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that halts scheduling of further dates when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the full backtest.
    pub fn run(&self) -> Result<BacktestResult, ValuesimError> {
        let dates = rebalance_dates(
            self.config.start_date,
            self.config.end_date,
            self.config.rebalance_frequency,
        );
        info!(
            "backtest {} to {}: {} rebalance dates, {} symbols",
            self.config.start_date,
            self.config.end_date,
            dates.len(),
            self.config.universe.len()
        );

        let mut ledger = Ledger::new(self.config.initial_capital);
        let mut missed_buys: Vec<MissedBuy> = Vec::new();

        for date in dates {
            if self.cancel.load(Ordering::SeqCst) {
                info!("cancelled before {date}, keeping recorded history");
                break;
            }

            let snapshots = self.collect_snapshots(date);
            if snapshots.is_empty() {
                // Nothing to value, nothing to trade: recording an all-cash
                // point here would turn a data outage into a silent zero.
                warn!("{date}: no point-in-time data for any symbol, round skipped");
                continue;
            }
            let sector_stats = self.build_sector_stats(&snapshots);
            let candidates = self.evaluate_candidates(&snapshots, &sector_stats);

            let buy_rated = candidates
                .iter()
                .filter(|c| c.rating == Rating::Buy)
                .count();
            debug!(
                "{date}: {} snapshots, {} candidates, {buy_rated} rated {}",
                snapshots.len(),
                candidates.len(),
                Rating::Buy
            );

            let targets = self.constructor.build(&candidates, date);
            let prices = snapshots
                .iter()
                .map(|s| (s.symbol.clone(), s.price.close))
                .collect();

            let outcome = self.simulator.run_step(&mut ledger, &targets, &prices, date);
            missed_buys.extend(outcome.missed_buys.clone());
            debug!(
                "{date}: {} trades, value {:.2}",
                outcome.trades_executed, outcome.value_after
            );
        }

        if ledger.value_history.is_empty() {
            return Err(ValuesimError::EmptyHistory);
        }

        let summary = analyze(
            &ledger.value_history,
            &ledger.trade_log,
            self.config.rebalance_frequency.periods_per_year(),
            self.config.risk_free_rate,
        );

        Ok(BacktestResult {
            summary,
            trade_log: ledger.trade_log,
            value_history: ledger.value_history,
            missed_buys,
        })
    }

    /// Fan the universe out across the pool; symbols without point-in-time
    /// data drop out of the round here.
    fn collect_snapshots(&self, date: chrono::NaiveDate) -> Vec<AsOfSnapshot> {
        self.config
            .universe
            .par_iter()
            .filter_map(|symbol| match self.gate.get_snapshot(symbol, date) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    debug!("{symbol} skipped: {err}");
                    None
                }
            })
            .collect()
    }

    fn build_sector_stats(&self, snapshots: &[AsOfSnapshot]) -> SectorStats {
        let mut builder = SectorStatsBuilder::default();
        for snapshot in snapshots {
            let fin = &snapshot.financials;
            let Some(sector) = fin.sector.as_deref() else {
                continue;
            };
            if let Some(debt) = fin.debt_ratio {
                builder.add_debt_ratio(sector, debt);
            }
            value_score::raw_metrics(fin)
                .for_each(|metric, value| builder.add_metric(sector, metric, value));
        }
        builder.build(
            self.config.min_sector_peers,
            self.config.sector_std_fraction,
        )
    }

    fn evaluate_candidates(
        &self,
        snapshots: &[AsOfSnapshot],
        sector_stats: &SectorStats,
    ) -> Vec<Candidate> {
        snapshots
            .par_iter()
            .filter_map(|snapshot| {
                let outcome = self.pipeline.evaluate(snapshot, sector_stats);
                if let Some(rejected) = outcome.rejected_at() {
                    debug!(
                        "{}: rejected at {} ({})",
                        outcome.symbol, rejected.stage, rejected.reason
                    );
                }
                outcome.candidate
            })
            .collect()
    }
}
