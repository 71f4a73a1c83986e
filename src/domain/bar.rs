//! Price bars and the column schema clauses resolve against.
//!
//! A [`BarSeries`] is the prepared input of a run: a strictly increasing
//! time index, the five price fields, and any number of named indicator
//! columns stored positionally in each bar's `extra` vector.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use crate::domain::error::FastTradeError;

/// Price fields every bar carries.
pub const PRICE_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Indicator values, positionally matching [`BarSeries::columns`].
    pub extra: Vec<f64>,
}

impl OhlcvBar {
    pub fn new(time: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            extra: Vec::new(),
        }
    }

    /// Value of a price field by name, `None` for indicator columns.
    pub fn price_field(&self, name: &str) -> Option<f64> {
        match name {
            "open" => Some(self.open),
            "high" => Some(self.high),
            "low" => Some(self.low),
            "close" => Some(self.close),
            "volume" => Some(self.volume),
            _ => None,
        }
    }

    /// Indicator column by position; NaN when the bar does not carry it.
    pub fn column(&self, index: usize) -> f64 {
        self.extra.get(index).copied().unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    columns: Vec<String>,
    bars: Vec<OhlcvBar>,
}

impl BarSeries {
    /// Build a series, checking that the time index is strictly increasing
    /// and that every bar carries one value per indicator column.
    pub fn new(columns: Vec<String>, bars: Vec<OhlcvBar>) -> Result<Self, FastTradeError> {
        for (i, bar) in bars.iter().enumerate() {
            if bar.extra.len() != columns.len() {
                return Err(FastTradeError::Data {
                    reason: format!(
                        "row {} has {} indicator values, expected {}",
                        i,
                        bar.extra.len(),
                        columns.len()
                    ),
                });
            }
            if i > 0 && bar.time <= bars[i - 1].time {
                return Err(FastTradeError::NonMonotonicIndex {
                    position: i,
                    time: format_timestamp(&bar.time),
                });
            }
        }
        if let Some(name) = columns.iter().find(|c| PRICE_FIELDS.contains(&c.as_str())) {
            return Err(FastTradeError::Data {
                reason: format!("indicator column '{}' shadows a price field", name),
            });
        }
        Ok(Self { columns, bars })
    }

    pub fn from_bars(bars: Vec<OhlcvBar>) -> Result<Self, FastTradeError> {
        Self::new(Vec::new(), bars)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// True for price fields and indicator columns alike.
    pub fn has_field(&self, name: &str) -> bool {
        PRICE_FIELDS.contains(&name) || self.column_index(name).is_some()
    }

    /// Values of one field across the series.
    pub fn field_values(&self, name: &str) -> Option<Vec<f64>> {
        if PRICE_FIELDS.contains(&name) {
            return Some(
                self.bars
                    .iter()
                    .filter_map(|b| b.price_field(name))
                    .collect(),
            );
        }
        let index = self.column_index(name)?;
        Some(self.bars.iter().map(|b| b.column(index)).collect())
    }

    /// Append (or replace) an indicator column.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Result<Self, FastTradeError> {
        if values.len() != self.bars.len() {
            return Err(FastTradeError::Data {
                reason: format!(
                    "column '{}' has {} values for {} bars",
                    name,
                    values.len(),
                    self.bars.len()
                ),
            });
        }
        if PRICE_FIELDS.contains(&name) {
            return Err(FastTradeError::Data {
                reason: format!("indicator column '{}' shadows a price field", name),
            });
        }
        match self.column_index(name) {
            Some(index) => {
                for (bar, value) in self.bars.iter_mut().zip(values) {
                    bar.extra[index] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (bar, value) in self.bars.iter_mut().zip(values) {
                    bar.extra.push(value);
                }
            }
        }
        Ok(self)
    }

    /// Keep only bars inside `[start, stop]`; open bounds when `None`.
    pub fn slice(&self, start: Option<NaiveDateTime>, stop: Option<NaiveDateTime>) -> Self {
        let bars = self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.time >= s) && stop.is_none_or(|s| b.time <= s))
            .cloned()
            .collect();
        Self {
            columns: self.columns.clone(),
            bars,
        }
    }

    /// The most common spacing between consecutive bars; ties resolve to
    /// the shorter interval. `None` with fewer than two bars.
    pub fn infer_interval(&self) -> Option<Duration> {
        infer_interval(self.bars.iter().map(|b| b.time))
    }
}

pub fn infer_interval(times: impl Iterator<Item = NaiveDateTime>) -> Option<Duration> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    let mut prev: Option<NaiveDateTime> = None;
    for time in times {
        if let Some(p) = prev {
            let secs = (time - p).num_seconds();
            if secs > 0 {
                *counts.entry(secs).or_insert(0) += 1;
            }
        }
        prev = Some(time);
    }
    counts
        .into_iter()
        .max_by(|(a_secs, a_n), (b_secs, b_n)| a_n.cmp(b_n).then(b_secs.cmp(a_secs)))
        .map(|(secs, _)| Duration::seconds(secs))
}

/// Parse a time key: unix seconds or milliseconds, or one of the usual
/// `%Y-%m-%d[ %H:%M[:%S]]` layouts.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(raw) = value.parse::<f64>() {
        if !raw.is_finite() {
            return None;
        }
        let secs = if raw.abs() >= 1e11 { raw / 1000.0 } else { raw };
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round() as u32;
        return DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).map(|dt| dt.naive_utc());
    }
    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}
