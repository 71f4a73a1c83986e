//! Backtest orchestration.
//!
//! A run is a pure function of (configuration, bar series):
//!
//! 1. data checks and optional `start`/`stop` trim
//! 2. indicator columns from the transformer registry, trailing stop column
//! 3. validation and clause compilation
//! 4. action resolution, simulation, trade log, summary, rules
//!
//! Independent runs fan out across threads in [`run_batch`].

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::action::{Action, ActionResolver};
use crate::domain::bar::{BarSeries, parse_timestamp};
use crate::domain::config_validation::compile_strategy;
use crate::domain::error::{FastTradeError, ValidationReport};
use crate::domain::metrics::Summary;
use crate::domain::rule_eval::{RuleOutcome, evaluate_rules};
use crate::domain::simulator::{LedgerRow, simulate};
use crate::domain::strategy::BacktestConfig;
use crate::domain::trade_log::{TradeLogEntry, extract_trade_log};
use crate::domain::transformer::{TransformerRegistry, apply_indicators, with_trailing_stop};
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Indicator column names carried by every ledger bar.
    pub columns: Vec<String>,
    pub ledger: Vec<LedgerRow>,
    pub trade_log: Vec<TradeLogEntry>,
    pub summary: Summary,
    pub rules: Option<RuleOutcome>,
    /// Wall-clock duration of the run. Not part of the summary.
    pub elapsed: Duration,
}

impl BacktestResult {
    pub fn actions(&self) -> Vec<Action> {
        self.ledger.iter().map(|r| r.action).collect()
    }
}

pub fn run_backtest(
    config: &BacktestConfig,
    series: &BarSeries,
    rules: Option<&[Value]>,
) -> Result<BacktestResult, FastTradeError> {
    run_backtest_with(config, series, &TransformerRegistry::new(), rules)
}

pub fn run_backtest_with(
    config: &BacktestConfig,
    series: &BarSeries,
    registry: &TransformerRegistry,
    rules: Option<&[Value]>,
) -> Result<BacktestResult, FastTradeError> {
    let started = Instant::now();
    if series.is_empty() {
        return Err(FastTradeError::EmptySeries);
    }

    let series = prepare_series(config, series, registry)?;
    if series.is_empty() {
        return Err(FastTradeError::EmptySeries);
    }
    let strategy = compile_strategy(config, series.columns())
        .map_err(|report| classify_failure(config, &series, report))?;
    let actions = ActionResolver::new(&strategy).resolve_all(series.bars());
    let ledger = simulate(series.bars(), &actions, config, series.infer_interval());
    let trade_log = extract_trade_log(&ledger, config.base_balance);
    let summary = Summary::compute(&ledger, &trade_log);
    let rules = rules.map(|rules| evaluate_rules(&summary.to_value(), rules));

    let elapsed = started.elapsed();
    info!(
        strategy = %config.name,
        bars = series.len(),
        trades = summary.num_trades,
        return_perc = summary.return_perc,
        elapsed_ms = elapsed.as_millis() as u64,
        "backtest finished"
    );

    Ok(BacktestResult {
        columns: series.columns().to_vec(),
        ledger,
        trade_log,
        summary,
        rules,
        elapsed,
    })
}

/// A config whose only fault is a column the data lacks is a data error.
/// Any other problem keeps the full report.
fn classify_failure(
    config: &BacktestConfig,
    series: &BarSeries,
    report: ValidationReport,
) -> FastTradeError {
    let missing: Vec<String> = config
        .referenced_fields()
        .into_iter()
        .filter(|f| !series.has_field(f))
        .collect();
    let Some(first) = missing.first() else {
        return FastTradeError::Validation(report);
    };
    let mut columns = series.columns().to_vec();
    columns.extend(missing.iter().cloned());
    if compile_strategy(config, &columns).is_ok() {
        FastTradeError::MissingColumn {
            column: first.clone(),
        }
    } else {
        FastTradeError::Validation(report)
    }
}

fn prepare_series(
    config: &BacktestConfig,
    series: &BarSeries,
    registry: &TransformerRegistry,
) -> Result<BarSeries, FastTradeError> {
    let start = config.start.as_deref().and_then(parse_timestamp);
    let stop = config.stop.as_deref().and_then(parse_timestamp);
    let series = if start.is_some() || stop.is_some() {
        series.slice(start, stop)
    } else {
        series.clone()
    };
    let series = apply_indicators(series, &config.indicators, registry)?;
    with_trailing_stop(series, config.trailing_stop_loss)
}

/// Run one configuration over many symbols in parallel. Results come back
/// in input order; a failing symbol does not affect the others.
pub fn run_batch(
    config: &BacktestConfig,
    symbols: &[String],
    data: &(dyn DataPort + Sync),
    registry: &TransformerRegistry,
    rules: Option<&[Value]>,
) -> Vec<(String, Result<BacktestResult, FastTradeError>)> {
    info!(symbols = symbols.len(), "starting batch");
    symbols
        .par_iter()
        .map(|symbol| {
            let result = data
                .fetch_bars(symbol)
                .and_then(|series| run_backtest_with(config, &series, registry, rules));
            if let Err(e) = &result {
                warn!(%symbol, error = %e, "backtest failed");
            }
            (symbol.clone(), result)
        })
        .collect()
}
