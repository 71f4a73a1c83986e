//! CSV file data adapter.
//!
//! Reads `<dir>/<SYMBOL>.csv` files with a header row. The time column is
//! `date`, `time`, `timestamp` or `datetime` (the first column otherwise);
//! `open,high,low,close,volume` are required and every other numeric column
//! is loaded as an indicator column.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::bar::{BarSeries, OhlcvBar, PRICE_FIELDS, parse_timestamp};
use crate::domain::error::FastTradeError;
use crate::ports::data_port::DataPort;

const TIME_COLUMNS: [&str; 4] = ["date", "time", "timestamp", "datetime"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<BarSeries, FastTradeError> {
        read_csv_file(self.csv_path(symbol))
    }

    fn list_symbols(&self) -> Result<Vec<String>, FastTradeError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

pub fn read_csv_file<P: AsRef<Path>>(path: P) -> Result<BarSeries, FastTradeError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        FastTradeError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read {}: {}", path.display(), e),
        ))
    })?;
    read_csv(file)
}

fn parse_cell(value: &str) -> Option<f64> {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "" | "nan" | "null" | "none" => Some(f64::NAN),
        "true" => Some(1.0),
        "false" => Some(0.0),
        _ => value.parse::<f64>().ok(),
    }
}

/// Parse a bar series from CSV text with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<BarSeries, FastTradeError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| FastTradeError::Data {
            reason: format!("CSV header error: {e}"),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let time_index = headers
        .iter()
        .position(|h| TIME_COLUMNS.iter().any(|t| h.eq_ignore_ascii_case(t)))
        .unwrap_or(0);
    let mut price_index = [0usize; 5];
    for (slot, field) in price_index.iter_mut().zip(PRICE_FIELDS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(field))
            .ok_or_else(|| FastTradeError::MissingColumn {
                column: field.to_string(),
            })?;
    }
    let mut extra_index: Vec<usize> = (0..headers.len())
        .filter(|i| *i != time_index && !price_index.contains(i))
        .collect();

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| FastTradeError::Data {
            reason: format!("CSV parse error: {e}"),
        })?;
        let raw_time = record.get(time_index).unwrap_or_default();
        let time = parse_timestamp(raw_time).ok_or_else(|| FastTradeError::Data {
            reason: format!("row {}: invalid time '{}'", row + 1, raw_time),
        })?;
        records.push((time, record));
    }

    // Text columns (symbol names and the like) are not indicators.
    extra_index.retain(|&i| {
        let numeric = records
            .iter()
            .all(|(_, r)| parse_cell(r.get(i).unwrap_or_default()).is_some());
        if !numeric {
            debug!(column = %headers[i], "skipping non-numeric column");
        }
        numeric
    });

    let mut bars = Vec::with_capacity(records.len());
    for (row, (time, record)) in records.iter().enumerate() {
        let mut prices = [0.0f64; 5];
        for (value, (&index, field)) in prices.iter_mut().zip(price_index.iter().zip(PRICE_FIELDS)) {
            let raw = record.get(index).unwrap_or_default();
            *value = parse_cell(raw).ok_or_else(|| FastTradeError::Data {
                reason: format!("row {}: invalid {} value '{}'", row + 1, field, raw),
            })?;
        }
        let [open, high, low, close, volume] = prices;
        let mut bar = OhlcvBar::new(*time, open, high, low, close, volume);
        bar.extra = extra_index
            .iter()
            .map(|&i| parse_cell(record.get(i).unwrap_or_default()).unwrap_or(f64::NAN))
            .collect();
        bars.push(bar);
    }
    bars.sort_by_key(|b| b.time);

    let columns = extra_index.iter().map(|&i| headers[i].clone()).collect();
    BarSeries::new(columns, bars)
}
