//! Rebalance simulation: DIFF, SELL_EXCESS, BUY_TARGETS, RECORD.
//!
//! One state machine pass per scheduled date. Sells are never
//! cash-constrained; buys execute in rank order and a buy the cash cannot
//! cover is skipped whole, recorded as missed, never partially filled.
//! The machine owns the ledger for the duration of the step and resets to
//! DIFF for the next date.

use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::construction::TargetWeight;
use crate::domain::ledger::{Ledger, Trade, TradeSide};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Adverse execution-price drift per leg, as a fraction (0.001 = 0.1%).
    pub slippage: f64,
    /// Transaction cost per leg on gross value (0.0015 = 0.15%).
    pub transaction_cost: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage: 0.001,
            transaction_cost: 0.0015,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RebalancePhase {
    Diff,
    SellExcess,
    BuyTargets,
    Record,
    Done,
}

/// A buy skipped whole because cash could not cover it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissedBuy {
    pub date: NaiveDate,
    pub symbol: String,
    pub shares: u64,
    pub required: f64,
    pub available: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub date: NaiveDate,
    pub trades_executed: usize,
    pub missed_buys: Vec<MissedBuy>,
    pub value_after: f64,
}

pub struct RebalanceSimulator {
    config: ExecutionConfig,
}

impl RebalanceSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        RebalanceSimulator { config }
    }

    /// Run one full rebalance step against the ledger.
    ///
    /// `prices` are the lagged closes from this round's snapshots. Held
    /// symbols without a quote are untouched: they can be neither valued
    /// for the diff nor traded, so they carry over as-is.
    pub fn run_step(
        &self,
        ledger: &mut Ledger,
        targets: &[TargetWeight],
        prices: &HashMap<String, f64>,
        date: NaiveDate,
    ) -> RebalanceOutcome {
        let trades_before = ledger.trade_log.len();
        let mut target_shares: HashMap<String, u64> = HashMap::new();
        let mut missed_buys = Vec::new();
        let mut value_after = 0.0;

        let mut phase = RebalancePhase::Diff;
        while phase != RebalancePhase::Done {
            phase = match phase {
                RebalancePhase::Diff => {
                    target_shares = self.diff(ledger, targets, prices);
                    RebalancePhase::SellExcess
                }
                RebalancePhase::SellExcess => {
                    self.sell_excess(ledger, &target_shares, prices, date);
                    RebalancePhase::BuyTargets
                }
                RebalancePhase::BuyTargets => {
                    missed_buys =
                        self.buy_targets(ledger, targets, &target_shares, prices, date);
                    RebalancePhase::Record
                }
                RebalancePhase::Record => {
                    value_after = ledger.total_value(prices);
                    ledger.record_value(date, value_after);
                    RebalancePhase::Done
                }
                RebalancePhase::Done => RebalancePhase::Done,
            };
        }

        RebalanceOutcome {
            date,
            trades_executed: ledger.trade_log.len() - trades_before,
            missed_buys,
            value_after,
        }
    }

    /// Whole-share targets from current portfolio value at lagged prices.
    fn diff(
        &self,
        ledger: &Ledger,
        targets: &[TargetWeight],
        prices: &HashMap<String, f64>,
    ) -> HashMap<String, u64> {
        let portfolio_value = ledger.total_value(prices);
        targets
            .iter()
            .filter_map(|t| {
                let price = *prices.get(&t.symbol)?;
                if price <= 0.0 {
                    return None;
                }
                let shares = (portfolio_value * t.weight / price).floor();
                Some((t.symbol.clone(), shares as u64))
            })
            .collect()
    }

    /// Liquidate symbols absent from the targets and trim over-weight
    /// positions. Iterates in symbol order for a deterministic trade log.
    fn sell_excess(
        &self,
        ledger: &mut Ledger,
        target_shares: &HashMap<String, u64>,
        prices: &HashMap<String, f64>,
        date: NaiveDate,
    ) {
        let mut held: Vec<(String, u64)> = ledger
            .positions
            .values()
            .map(|p| (p.symbol.clone(), p.shares))
            .collect();
        held.sort();

        for (symbol, shares) in held {
            let Some(&price) = prices.get(&symbol) else {
                debug!("{symbol}: no lagged price, position carried over");
                continue;
            };
            let wanted = target_shares.get(&symbol).copied().unwrap_or(0);
            if shares <= wanted {
                continue;
            }
            let to_sell = shares - wanted;
            let execution_price = price * (1.0 - self.config.slippage);
            let gross = to_sell as f64 * execution_price;
            ledger.apply_sell(Trade {
                date,
                symbol,
                side: TradeSide::Sell,
                shares: to_sell,
                price: execution_price,
                cost: gross * self.config.transaction_cost,
            });
        }
    }

    /// Execute remaining purchases in rank order under the cash constraint.
    fn buy_targets(
        &self,
        ledger: &mut Ledger,
        targets: &[TargetWeight],
        target_shares: &HashMap<String, u64>,
        prices: &HashMap<String, f64>,
        date: NaiveDate,
    ) -> Vec<MissedBuy> {
        let mut missed = Vec::new();

        for target in targets {
            let Some(&wanted) = target_shares.get(&target.symbol) else {
                continue;
            };
            let held = ledger.shares_held(&target.symbol);
            if held >= wanted {
                continue;
            }
            let to_buy = wanted - held;
            let Some(&price) = prices.get(&target.symbol) else {
                continue;
            };

            let execution_price = price * (1.0 + self.config.slippage);
            let gross = to_buy as f64 * execution_price;
            let fee = gross * self.config.transaction_cost;
            let required = gross + fee;

            if required > ledger.cash {
                warn!(
                    "{date} {}: buy of {to_buy} needs {required:.2}, cash {:.2}, skipped",
                    target.symbol, ledger.cash
                );
                missed.push(MissedBuy {
                    date,
                    symbol: target.symbol.clone(),
                    shares: to_buy,
                    required,
                    available: ledger.cash,
                });
                continue;
            }

            ledger.apply_buy(Trade {
                date,
                symbol: target.symbol.clone(),
                side: TradeSide::Buy,
                shares: to_buy,
                price: execution_price,
                cost: fee,
            });
        }

        missed
    }
}
