//! File report adapter implementing ReportPort.
//!
//! Each run lands in `<out_dir>/<symbol>/` as `summary.json`, `ledger.csv`
//! and `trade_log.csv`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::bar::format_timestamp;
use crate::domain::error::FastTradeError;
use crate::ports::report_port::ReportPort;

const LEDGER_TAIL: [&str; 9] = [
    "action",
    "in_trade",
    "aux",
    "account_value",
    "adjusted_account_value",
    "adjusted_account_value_change",
    "adjusted_account_value_change_perc",
    "fee",
    "synthetic",
];

pub struct FileReportAdapter {
    out_dir: PathBuf,
}

impl FileReportAdapter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.out_dir.join(symbol)
    }
}

fn csv_error(path: &Path, e: csv::Error) -> FastTradeError {
    FastTradeError::Data {
        reason: format!("failed to write {}: {e}", path.display()),
    }
}

fn write_summary(path: &Path, result: &BacktestResult) -> Result<(), FastTradeError> {
    let mut document = json!({ "summary": result.summary });
    if let Some(rules) = &result.rules {
        document["rules"] = json!(rules);
    }
    fs::write(path, serde_json::to_string_pretty(&document)?)?;
    Ok(())
}

fn write_ledger(path: &Path, result: &BacktestResult) -> Result<(), FastTradeError> {
    let mut wtr = csv::Writer::from_writer(File::create(path)?);
    let header: Vec<&str> = ["time", "open", "high", "low", "close", "volume"]
        .into_iter()
        .chain(result.columns.iter().map(String::as_str))
        .chain(LEDGER_TAIL)
        .collect();
    wtr.write_record(&header).map_err(|e| csv_error(path, e))?;

    for row in &result.ledger {
        let bar = &row.bar;
        let mut record = vec![
            format_timestamp(&bar.time),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ];
        record.extend(bar.extra.iter().map(f64::to_string));
        record.extend([
            row.action.to_string(),
            row.in_trade.to_string(),
            row.aux.to_string(),
            row.account_value.to_string(),
            row.adjusted_account_value.to_string(),
            row.adjusted_account_value_change.to_string(),
            row.adjusted_account_value_change_perc.to_string(),
            row.fee.to_string(),
            row.synthetic.to_string(),
        ]);
        wtr.write_record(&record).map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_trade_log(path: &Path, result: &BacktestResult) -> Result<(), FastTradeError> {
    let mut wtr = csv::Writer::from_writer(File::create(path)?);
    wtr.write_record([
        "time",
        "action",
        "in_trade",
        "close",
        "adjusted_account_value",
        "change",
        "change_perc",
        "fee",
    ])
    .map_err(|e| csv_error(path, e))?;

    for entry in &result.trade_log {
        wtr.write_record([
            format_timestamp(&entry.time),
            entry.action.to_string(),
            entry.in_trade.to_string(),
            entry.close.to_string(),
            entry.adjusted_account_value.to_string(),
            entry.change.to_string(),
            entry.change_perc.to_string(),
            entry.fee.to_string(),
        ])
        .map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for FileReportAdapter {
    fn write(&self, result: &BacktestResult, symbol: &str) -> Result<(), FastTradeError> {
        let dir = self.symbol_dir(symbol);
        fs::create_dir_all(&dir)?;
        write_summary(&dir.join("summary.json"), result)?;
        write_ledger(&dir.join("ledger.csv"), result)?;
        write_trade_log(&dir.join("trade_log.csv"), result)?;
        info!(%symbol, dir = %dir.display(), "report written");
        Ok(())
    }
}
