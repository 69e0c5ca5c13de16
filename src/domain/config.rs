//! Backtest configuration: typed, validated before anything runs.
//!
//! All limits are checked at construction; a bad value is fatal before the
//! first rebalance date is even scheduled. Sub-configs for the pipeline,
//! constructor and simulator are derived views of this one record.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::domain::construction::ConstructorConfig;
use crate::domain::error::ValuesimError;
use crate::domain::pipeline::margin_of_safety::{default_scenarios, MosConfig};
use crate::domain::pipeline::PipelineConfig;
use crate::domain::rebalance::ExecutionConfig;
use crate::domain::schedule::RebalanceFrequency;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rebalance_frequency: RebalanceFrequency,
    pub initial_capital: f64,
    pub universe: Vec<String>,

    pub max_positions: usize,
    pub min_positions: usize,
    pub max_weight_per_stock: f64,
    pub max_sector_weight: f64,

    pub transaction_cost: f64,
    pub slippage: f64,

    pub financial_lag_days: u32,
    pub price_lag_days: u32,

    pub max_missing_core_fields: usize,
    pub score_threshold: f64,
    pub min_mos_watch: f64,
    pub min_mos_buy: f64,
    pub buy_quality_floor: u32,
    pub buy_risk_floor: f64,

    /// Sector leverage z-cut; `None` disables the check.
    pub sector_z_cut: Option<f64>,
    /// Fallback sector stdev as a fraction of the median. A policy choice,
    /// not a derived statistic; kept configurable on purpose.
    pub sector_std_fraction: f64,
    /// Sector-percentile fraction of each valuation sub-score. Same caveat.
    pub relative_blend: f64,
    pub min_sector_peers: usize,

    pub risk_free_rate: f64,
}

impl BacktestConfig {
    /// Sensible defaults for everything except the run window and universe.
    pub fn with_window(
        start_date: NaiveDate,
        end_date: NaiveDate,
        universe: Vec<String>,
    ) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            rebalance_frequency: RebalanceFrequency::Monthly,
            initial_capital: 100_000.0,
            universe,
            max_positions: 20,
            min_positions: 5,
            max_weight_per_stock: 0.10,
            max_sector_weight: 0.30,
            transaction_cost: 0.0015,
            slippage: 0.001,
            financial_lag_days: 90,
            price_lag_days: 2,
            max_missing_core_fields: 2,
            score_threshold: 40.0,
            min_mos_watch: 0.10,
            min_mos_buy: 0.30,
            buy_quality_floor: 7,
            buy_risk_floor: 0.70,
            sector_z_cut: None,
            sector_std_fraction: 0.30,
            relative_blend: 0.30,
            min_sector_peers: 3,
            risk_free_rate: 0.02,
        }
    }

    /// Build from a config port and validate. `[backtest]` holds the run
    /// window, capital, frictions and universe; `[strategy]` the position
    /// limits and gate thresholds.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ValuesimError> {
        let start_date = require_date(config, "backtest", "start_date")?;
        let end_date = require_date(config, "backtest", "end_date")?;
        let universe = parse_symbols(&require_string(config, "backtest", "symbols")?)?;

        let frequency_raw = config
            .get_string("backtest", "rebalance_frequency")
            .unwrap_or_else(|| "monthly".to_string());
        let rebalance_frequency = RebalanceFrequency::parse(&frequency_raw)?;

        let defaults = BacktestConfig::with_window(start_date, end_date, Vec::new());

        let sector_z_cut = if config.get_bool("strategy", "sector_z_check", false) {
            Some(config.get_double("strategy", "sector_z_cut", -2.0))
        } else {
            None
        };

        let built = BacktestConfig {
            start_date,
            end_date,
            rebalance_frequency,
            initial_capital: config.get_double(
                "backtest",
                "initial_capital",
                defaults.initial_capital,
            ),
            universe,
            max_positions: read_usize(config, "strategy", "max_positions", 20),
            min_positions: read_usize(config, "strategy", "min_positions", 5),
            max_weight_per_stock: config.get_double(
                "strategy",
                "max_weight_per_stock",
                defaults.max_weight_per_stock,
            ),
            max_sector_weight: config.get_double(
                "strategy",
                "max_sector_weight",
                defaults.max_sector_weight,
            ),
            transaction_cost: config.get_double(
                "backtest",
                "transaction_cost",
                defaults.transaction_cost,
            ),
            slippage: config.get_double("backtest", "slippage", defaults.slippage),
            financial_lag_days: read_u32(config, "backtest", "financial_lag_days", 90),
            price_lag_days: read_u32(config, "backtest", "price_lag_days", 2),
            max_missing_core_fields: read_usize(
                config,
                "strategy",
                "max_missing_core_fields",
                2,
            ),
            score_threshold: config.get_double(
                "strategy",
                "score_threshold",
                defaults.score_threshold,
            ),
            min_mos_watch: config.get_double("strategy", "min_mos_watch", defaults.min_mos_watch),
            min_mos_buy: config.get_double("strategy", "min_mos_buy", defaults.min_mos_buy),
            buy_quality_floor: read_u32(config, "strategy", "buy_quality_floor", 7),
            buy_risk_floor: config.get_double(
                "strategy",
                "buy_risk_floor",
                defaults.buy_risk_floor,
            ),
            sector_z_cut,
            sector_std_fraction: config.get_double(
                "strategy",
                "sector_std_fraction",
                defaults.sector_std_fraction,
            ),
            relative_blend: config.get_double(
                "strategy",
                "relative_blend",
                defaults.relative_blend,
            ),
            min_sector_peers: read_usize(config, "strategy", "min_sector_peers", 3),
            risk_free_rate: config.get_double(
                "backtest",
                "risk_free_rate",
                defaults.risk_free_rate,
            ),
        };
        built.validate()?;
        Ok(built)
    }

    pub fn validate(&self) -> Result<(), ValuesimError> {
        if self.initial_capital <= 0.0 {
            return Err(invalid("initial_capital", "must be positive"));
        }
        if self.start_date >= self.end_date {
            return Err(invalid("start_date", "start_date must be before end_date"));
        }
        if self.universe.is_empty() {
            return Err(ValuesimError::ConfigMissing {
                section: "backtest".into(),
                key: "symbols".into(),
            });
        }
        if self.min_positions < 1 {
            return Err(invalid("min_positions", "must be at least 1"));
        }
        if self.max_positions < self.min_positions {
            return Err(invalid(
                "max_positions",
                "must be at least min_positions",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_weight_per_stock) || self.max_weight_per_stock == 0.0 {
            return Err(invalid("max_weight_per_stock", "must be in (0, 1]"));
        }
        if self.max_sector_weight < self.max_weight_per_stock || self.max_sector_weight > 1.0 {
            return Err(invalid(
                "max_sector_weight",
                "must be in [max_weight_per_stock, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.transaction_cost) {
            return Err(invalid("transaction_cost", "must be in [0, 1)"));
        }
        if !(0.0..1.0).contains(&self.slippage) {
            return Err(invalid("slippage", "must be in [0, 1)"));
        }
        if !(0.0..=100.0).contains(&self.score_threshold) {
            return Err(invalid("score_threshold", "must be in [0, 100]"));
        }
        if !(0.0..=1.0).contains(&self.min_mos_watch) {
            return Err(invalid("min_mos_watch", "must be in [0, 1]"));
        }
        if self.min_mos_buy < self.min_mos_watch || self.min_mos_buy > 1.0 {
            return Err(invalid("min_mos_buy", "must be in [min_mos_watch, 1]"));
        }
        if !(0.0..=1.0).contains(&self.buy_risk_floor) {
            return Err(invalid("buy_risk_floor", "must be in [0, 1]"));
        }
        if self.sector_std_fraction <= 0.0 || self.sector_std_fraction > 1.0 {
            return Err(invalid("sector_std_fraction", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.relative_blend) {
            return Err(invalid("relative_blend", "must be in [0, 1]"));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(invalid("risk_free_rate", "must be in [0, 1)"));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_missing_core_fields: self.max_missing_core_fields,
            score_threshold: self.score_threshold,
            relative_blend: self.relative_blend,
            sector_z_cut: self.sector_z_cut,
            mos: MosConfig {
                min_mos_watch: self.min_mos_watch,
                min_mos_buy: self.min_mos_buy,
                buy_quality_floor: self.buy_quality_floor,
                buy_risk_floor: self.buy_risk_floor,
                scenarios: default_scenarios(),
            },
        }
    }

    pub fn constructor_config(&self) -> ConstructorConfig {
        ConstructorConfig {
            max_positions: self.max_positions,
            min_positions: self.min_positions,
            max_weight_per_stock: self.max_weight_per_stock,
            max_sector_weight: self.max_sector_weight,
        }
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            slippage: self.slippage,
            transaction_cost: self.transaction_cost,
        }
    }
}

/// Parse a comma-separated symbol list: trimmed, uppercased, no blanks,
/// no duplicates.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, ValuesimError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();
    for token in input.split(',') {
        let symbol = token.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(invalid("symbols", "empty token in symbol list"));
        }
        if !seen.insert(symbol.clone()) {
            return Err(invalid("symbols", &format!("duplicate symbol {symbol}")));
        }
        symbols.push(symbol);
    }
    Ok(symbols)
}

fn invalid(key: &str, reason: &str) -> ValuesimError {
    ValuesimError::ConfigInvalid {
        section: section_for(key).into(),
        key: key.into(),
        reason: reason.into(),
    }
}

fn section_for(key: &str) -> &'static str {
    match key {
        "initial_capital" | "start_date" | "end_date" | "symbols" | "transaction_cost"
        | "slippage" | "risk_free_rate" | "rebalance_frequency" | "financial_lag_days"
        | "price_lag_days" => "backtest",
        _ => "strategy",
    }
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, ValuesimError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ValuesimError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        }),
    }
}

fn require_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, ValuesimError> {
    let raw = require_string(config, section, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ValuesimError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("invalid {key} format, expected YYYY-MM-DD"),
    })
}

fn read_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value).unwrap_or(default)
}

fn read_u32(config: &dyn ConfigPort, section: &str, key: &str, default: u32) -> u32 {
    let value = config.get_int(section, key, i64::from(default));
    u32::try_from(value).unwrap_or(default)
}
