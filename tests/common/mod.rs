#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use fasttrade::domain::bar::{BarSeries, OhlcvBar};
use fasttrade::domain::clause::{ClauseSpec, Term};
use fasttrade::domain::error::FastTradeError;
use fasttrade::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, BarSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, symbol: &str, series: BarSeries) -> Self {
        self.data.insert(symbol.to_string(), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str) -> Result<BarSeries, FastTradeError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(FastTradeError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, FastTradeError> {
        let mut symbols: Vec<String> = self.data.keys().chain(self.errors.keys()).cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(minute: i64, close: f64) -> OhlcvBar {
    OhlcvBar::new(
        start_time() + Duration::minutes(minute),
        close,
        close,
        close,
        close,
        1.0,
    )
}

/// One-minute bars with open = high = low = close.
pub fn make_series(closes: &[f64]) -> BarSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c))
        .collect();
    BarSeries::from_bars(bars).unwrap()
}

/// `signal` column driving `enter = signal = 1`, `exit = signal = -1`.
pub fn signal_series(closes: &[f64], signals: &[f64]) -> BarSeries {
    make_series(closes)
        .with_column("signal", signals.to_vec())
        .unwrap()
}

pub fn clause(left: &str, op: &str, right: f64) -> ClauseSpec {
    ClauseSpec::new(Term::Text(left.to_string()), op, Term::Number(right))
}

pub fn csv_text(closes: &[f64]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for (i, c) in closes.iter().enumerate() {
        let time = start_time() + Duration::minutes(i as i64);
        out.push_str(&format!(
            "{},{c},{c},{c},{c},1\n",
            time.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out
}
