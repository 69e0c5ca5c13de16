//! CSV report adapter: flat tables for external reporting.
//!
//! Writes four files into the output directory: `summary.csv` (one row),
//! `value_history.csv`, `trades.csv` and `missed_buys.csv`.

use std::fs;
use std::path::Path;

use crate::domain::error::ValuesimError;
use crate::domain::performance::BacktestResult;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    fn write_rows<T: serde::Serialize>(
        path: &Path,
        rows: impl IntoIterator<Item = T>,
    ) -> Result<(), ValuesimError> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| ValuesimError::Report {
            reason: format!("cannot open {}: {e}", path.display()),
        })?;
        for row in rows {
            writer.serialize(row).map_err(|e| ValuesimError::Report {
                reason: format!("cannot write {}: {e}", path.display()),
            })?;
        }
        writer.flush().map_err(|e| ValuesimError::Report {
            reason: format!("cannot flush {}: {e}", path.display()),
        })?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), ValuesimError> {
        fs::create_dir_all(output_dir)?;

        Self::write_rows(
            &output_dir.join("summary.csv"),
            std::iter::once(&result.summary),
        )?;
        Self::write_rows(&output_dir.join("value_history.csv"), &result.value_history)?;
        Self::write_rows(&output_dir.join("trades.csv"), &result.trade_log)?;
        Self::write_rows(&output_dir.join("missed_buys.csv"), &result.missed_buys)?;
        Ok(())
    }
}
