//! Ledger: cash, positions, trade log and value history.
//!
//! The ledger is the single mutable aggregate of the simulation. It is
//! owned by the rebalance simulator and mutated nowhere else. Trades are
//! append-only; positions exist only while shares are held.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Long-only position. Shares are whole and non-negative by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    pub average_cost: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// One executed leg. `price` is the execution price after slippage;
/// `cost` is the transaction fee charged on the leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: TradeSide,
    pub shares: u64,
    pub price: f64,
    pub cost: f64,
}

impl Trade {
    /// Notional traded, before fees.
    pub fn gross_value(&self) -> f64 {
        self.shares as f64 * self.price
    }
}

/// Post-rebalance valuation point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: HashMap<String, Position>,
    pub trade_log: Vec<Trade>,
    pub value_history: Vec<ValuePoint>,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Ledger {
            cash: initial_capital,
            initial_capital,
            positions: HashMap::new(),
            trade_log: Vec::new(),
            value_history: Vec::new(),
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn shares_held(&self, symbol: &str) -> u64 {
        self.positions.get(symbol).map_or(0, |p| p.shares)
    }

    /// Apply a buy: spend cash, grow the position at blended average cost,
    /// append the trade. Debits `gross + fee` from cash.
    pub fn apply_buy(&mut self, trade: Trade) {
        debug_assert_eq!(trade.side, TradeSide::Buy);
        let gross = trade.gross_value();
        self.cash -= gross + trade.cost;
        let entry = self
            .positions
            .entry(trade.symbol.clone())
            .or_insert_with(|| Position {
                symbol: trade.symbol.clone(),
                shares: 0,
                average_cost: 0.0,
            });
        let prior_cost = entry.shares as f64 * entry.average_cost;
        entry.shares += trade.shares;
        if entry.shares > 0 {
            entry.average_cost = (prior_cost + gross) / entry.shares as f64;
        }
        self.trade_log.push(trade);
    }

    /// Apply a sell: credit net proceeds, shrink or remove the position,
    /// append the trade. Selling more shares than held is a programming
    /// error upstream; the position floor-clamps at zero.
    pub fn apply_sell(&mut self, trade: Trade) {
        debug_assert_eq!(trade.side, TradeSide::Sell);
        self.cash += trade.gross_value() - trade.cost;
        if let Some(position) = self.positions.get_mut(&trade.symbol) {
            position.shares = position.shares.saturating_sub(trade.shares);
            if position.shares == 0 {
                self.positions.remove(&trade.symbol);
            }
        }
        self.trade_log.push(trade);
    }

    pub fn record_value(&mut self, date: NaiveDate, value: f64) {
        self.value_history.push(ValuePoint { date, value });
    }

    /// Cash plus mark-to-market of every position with a quoted price.
    pub fn total_value(&self, prices: &HashMap<String, f64>) -> f64 {
        let holdings: f64 = self
            .positions
            .values()
            .filter_map(|p| prices.get(&p.symbol).map(|price| p.market_value(*price)))
            .sum();
        self.cash + holdings
    }
}
