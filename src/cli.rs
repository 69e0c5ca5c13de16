//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_data_adapter::CsvDataAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::BacktestConfig;
use crate::domain::error::ValuesimError;
use crate::domain::orchestrator::BacktestOrchestrator;
use crate::domain::schedule::rebalance_dates;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "valuesim", about = "Point-in-time value strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for the CSV result tables
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Validate config and data, print the schedule, run nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the symbols available in the data directory
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => run_backtest(&config, output.as_deref(), dry_run),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ValuesimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn data_dir(adapter: &dyn ConfigPort, config_path: &PathBuf) -> Result<PathBuf, ValuesimError> {
    let raw = adapter
        .get_string("data", "path")
        .ok_or_else(|| ValuesimError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    let path = PathBuf::from(raw);
    // Relative data paths resolve against the config file's directory.
    if path.is_relative() {
        if let Some(parent) = config_path.parent() {
            return Ok(parent.join(path));
        }
    }
    Ok(path)
}

fn run_backtest(config_path: &PathBuf, output: Option<&std::path::Path>, dry_run: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match BacktestConfig::from_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data_path = match data_dir(&adapter, config_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Loading data from {}", data_path.display());
    let provider = match CsvDataAdapter::load(&data_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let dates = rebalance_dates(config.start_date, config.end_date, config.rebalance_frequency);
    eprintln!(
        "{} rebalance dates from {} to {}",
        dates.len(),
        config.start_date,
        config.end_date
    );

    if dry_run {
        for date in &dates {
            eprintln!("  {date}");
        }
        eprintln!("Dry run complete; config and data are usable.");
        return ExitCode::SUCCESS;
    }

    let orchestrator = BacktestOrchestrator::new(config, Arc::new(provider));
    let result = match orchestrator.run() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let s = &result.summary;
    println!("total_return       {:>10.4}", s.total_return);
    println!("annualized_return  {:>10.4}", s.annualized_return);
    println!("volatility         {:>10.4}", s.volatility);
    println!("sharpe_ratio       {:>10.4}", s.sharpe_ratio);
    println!("max_drawdown       {:>10.4}", s.max_drawdown);
    println!("turnover           {:>10.4}", s.turnover);
    println!("trades             {:>10}", result.trade_log.len());
    println!("missed_buys        {:>10}", result.missed_buys.len());

    if let Some(output_dir) = output {
        if let Err(e) = CsvReportAdapter.write(&result, output_dir) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Report written to {}", output_dir.display());
    }

    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match BacktestConfig::from_config(&adapter) {
        Ok(config) => {
            eprintln!(
                "Config OK: {} symbols, {} to {}",
                config.universe.len(),
                config.start_date,
                config.end_date
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_info(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_path = match data_dir(&adapter, config_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    match CsvDataAdapter::load(&data_path) {
        Ok(provider) => {
            for symbol in provider.symbols() {
                println!("{symbol}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
