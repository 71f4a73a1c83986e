//! Named column transformers.
//!
//! Indicators are computed outside the engine. A [`TransformerRegistry`]
//! maps a function name to a closure that turns one source column (plus
//! numeric arguments) into a new column of the same length. Nothing is
//! registered by default.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::bar::BarSeries;
use crate::domain::error::FastTradeError;

/// Name of the derived trailing stop column.
pub const TRAILING_STOP_COLUMN: &str = "trailing_stop_loss";

pub type TransformerFn = Box<dyn Fn(&[f64], &[f64]) -> Vec<f64> + Send + Sync>;

/// One indicator column to derive before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    /// Name of the produced column.
    pub name: String,
    #[serde(alias = "transformer")]
    pub func: String,
    #[serde(default)]
    pub args: Vec<f64>,
    /// Source column, `close` when omitted.
    #[serde(default)]
    pub column: Option<String>,
}

#[derive(Default)]
pub struct TransformerRegistry {
    functions: HashMap<String, TransformerFn>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[f64], &[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Box::new(func));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Derive one indicator column and append it to the series.
    pub fn apply(&self, series: BarSeries, spec: &IndicatorSpec) -> Result<BarSeries, FastTradeError> {
        let func = self
            .functions
            .get(&spec.func)
            .ok_or_else(|| FastTradeError::UnknownTransformer {
                name: spec.func.clone(),
            })?;
        let source = spec.column.as_deref().unwrap_or("close");
        let input = series
            .field_values(source)
            .ok_or_else(|| FastTradeError::MissingColumn {
                column: source.to_string(),
            })?;
        let output = func(&input, &spec.args);
        series.with_column(&spec.name, output)
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Apply every indicator spec in order; later specs may read earlier columns.
pub fn apply_indicators(
    series: BarSeries,
    specs: &[IndicatorSpec],
    registry: &TransformerRegistry,
) -> Result<BarSeries, FastTradeError> {
    specs
        .iter()
        .try_fold(series, |series, spec| registry.apply(series, spec))
}

/// Running high-water mark of `close` discounted by `trailing_stop_loss`.
pub fn trailing_stop_values(closes: &[f64], trailing_stop_loss: f64) -> Vec<f64> {
    let mut peak = f64::NAN;
    closes
        .iter()
        .map(|&close| {
            if !close.is_nan() && (peak.is_nan() || close > peak) {
                peak = close;
            }
            peak * (1.0 - trailing_stop_loss)
        })
        .collect()
}

/// Add the trailing stop column unless the series already carries one.
pub fn with_trailing_stop(series: BarSeries, trailing_stop_loss: f64) -> Result<BarSeries, FastTradeError> {
    if trailing_stop_loss <= 0.0 || series.column_index(TRAILING_STOP_COLUMN).is_some() {
        return Ok(series);
    }
    let closes: Vec<f64> = series.bars().iter().map(|b| b.close).collect();
    let values = trailing_stop_values(&closes, trailing_stop_loss);
    series.with_column(TRAILING_STOP_COLUMN, values)
}
