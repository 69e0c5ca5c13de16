//! CSV-backed point-in-time data adapter.
//!
//! Loads two files from a data directory: `prices.csv` (symbol, date,
//! close) and `financials.csv` (one row per symbol per fiscal period).
//! Queries honor the provider contract: nothing dated after the cutoff is
//! ever returned. Fundamental history is assembled from the period rows,
//! most recent first, so the pipeline's rolling checks see exactly the
//! periods that were public at the cutoff.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::error::ValuesimError;
use crate::domain::financials::{Financials, FiscalPeriod, Price};
use crate::ports::data_port::{DataProvider, ProviderFailure};

const HISTORY_PERIODS: usize = 5;

#[derive(Debug, Deserialize)]
struct PriceRow {
    symbol: String,
    date: String,
    close: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct FinancialRow {
    symbol: String,
    report_date: String,
    sector: Option<String>,
    market_cap: Option<f64>,
    shares_outstanding: Option<f64>,
    roe: Option<f64>,
    roa: Option<f64>,
    operating_margin: Option<f64>,
    net_margin: Option<f64>,
    debt_ratio: Option<f64>,
    debt_to_equity: Option<f64>,
    current_ratio: Option<f64>,
    revenue: Option<f64>,
    net_income: Option<f64>,
    total_assets: Option<f64>,
    ebit: Option<f64>,
    enterprise_value: Option<f64>,
    free_cash_flow: Option<f64>,
    owner_earnings: Option<f64>,
    operating_cash_flow: Option<f64>,
    dividends_paid: Option<f64>,
    buybacks: Option<f64>,
    payout_ratio: Option<f64>,
    eps: Option<f64>,
    eps_growth: Option<f64>,
}

#[derive(Debug)]
pub struct CsvDataAdapter {
    prices: HashMap<String, Vec<(NaiveDate, f64)>>,
    financials: HashMap<String, Vec<(NaiveDate, FinancialRow)>>,
}

impl CsvDataAdapter {
    /// Load `prices.csv` and `financials.csv` from `base_path`.
    pub fn load<P: AsRef<Path>>(base_path: P) -> Result<Self, ValuesimError> {
        let base = base_path.as_ref();
        let prices_raw = std::fs::read_to_string(base.join("prices.csv"))?;
        let financials_raw = std::fs::read_to_string(base.join("financials.csv"))?;
        Self::from_strings(&prices_raw, &financials_raw)
    }

    /// Build from in-memory CSV content. Used by tests and fixtures.
    pub fn from_strings(prices_csv: &str, financials_csv: &str) -> Result<Self, ValuesimError> {
        let mut prices: HashMap<String, Vec<(NaiveDate, f64)>> = HashMap::new();
        let mut reader = csv::Reader::from_reader(prices_csv.as_bytes());
        for row in reader.deserialize() {
            let row: PriceRow = row.map_err(csv_error)?;
            let date = parse_date(&row.date)?;
            prices
                .entry(row.symbol.to_uppercase())
                .or_default()
                .push((date, row.close));
        }
        for series in prices.values_mut() {
            series.sort_by_key(|(date, _)| *date);
        }

        let mut financials: HashMap<String, Vec<(NaiveDate, FinancialRow)>> = HashMap::new();
        let mut reader = csv::Reader::from_reader(financials_csv.as_bytes());
        for row in reader.deserialize() {
            let row: FinancialRow = row.map_err(csv_error)?;
            let date = parse_date(&row.report_date)?;
            financials
                .entry(row.symbol.to_uppercase())
                .or_default()
                .push((date, row));
        }
        for series in financials.values_mut() {
            series.sort_by_key(|(date, _)| *date);
        }

        Ok(CsvDataAdapter { prices, financials })
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.prices.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

impl DataProvider for CsvDataAdapter {
    fn get_financials(
        &self,
        symbol: &str,
        cutoff: NaiveDate,
    ) -> Result<Option<Financials>, ProviderFailure> {
        let Some(series) = self.financials.get(&symbol.to_uppercase()) else {
            return Ok(None);
        };
        let visible = series.partition_point(|(date, _)| *date <= cutoff);
        if visible == 0 {
            return Ok(None);
        }

        let (report_date, current) = &series[visible - 1];
        let history: Vec<FiscalPeriod> = series[..visible]
            .iter()
            .rev()
            .take(HISTORY_PERIODS)
            .map(|(date, row)| FiscalPeriod {
                fiscal_year: date.year(),
                revenue: row.revenue,
                net_income: row.net_income,
                operating_margin: row.operating_margin,
                net_margin: row.net_margin,
                total_assets: row.total_assets,
                free_cash_flow: row.free_cash_flow,
                debt_ratio: row.debt_ratio,
                current_ratio: row.current_ratio,
            })
            .collect();

        Ok(Some(Financials {
            symbol: symbol.to_uppercase(),
            report_date: *report_date,
            sector: current.sector.clone(),
            market_cap: current.market_cap,
            shares_outstanding: current.shares_outstanding,
            roe: current.roe,
            roa: current.roa,
            operating_margin: current.operating_margin,
            net_margin: current.net_margin,
            debt_ratio: current.debt_ratio,
            debt_to_equity: current.debt_to_equity,
            current_ratio: current.current_ratio,
            revenue: current.revenue,
            net_income: current.net_income,
            ebit: current.ebit,
            enterprise_value: current.enterprise_value,
            free_cash_flow: current.free_cash_flow,
            owner_earnings: current.owner_earnings,
            operating_cash_flow: current.operating_cash_flow,
            dividends_paid: current.dividends_paid,
            buybacks: current.buybacks,
            payout_ratio: current.payout_ratio,
            eps: current.eps,
            eps_growth: current.eps_growth,
            history,
        }))
    }

    fn get_price(
        &self,
        symbol: &str,
        cutoff: NaiveDate,
    ) -> Result<Option<Price>, ProviderFailure> {
        let Some(series) = self.prices.get(&symbol.to_uppercase()) else {
            return Ok(None);
        };
        let visible = series.partition_point(|(date, _)| *date <= cutoff);
        if visible == 0 {
            return Ok(None);
        }
        let (quote_date, close) = series[visible - 1];
        Ok(Some(Price {
            symbol: symbol.to_uppercase(),
            quote_date,
            close,
        }))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, ValuesimError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| ValuesimError::DataSource {
        reason: format!("invalid date '{raw}': {e}"),
    })
}

fn csv_error(err: csv::Error) -> ValuesimError {
    ValuesimError::DataSource {
        reason: format!("CSV parse error: {err}"),
    }
}
