//! Configuration validation.
//!
//! Checks every setting and clause before a run and compiles the clause
//! groups against the known column set. All problems are collected into one
//! [`ValidationReport`] instead of stopping at the first.

use tracing::warn;

use crate::domain::bar::parse_timestamp;
use crate::domain::clause::{Clause, ClauseSpec, Operand, Operator, Term};
use crate::domain::error::{FastTradeError, ValidationReport};
use crate::domain::strategy::{BacktestConfig, LogicGroup, Strategy};
use crate::domain::transformer::TRAILING_STOP_COLUMN;

/// Validate `config` against the indicator `columns` of the series it will
/// run on and resolve its clauses.
pub fn compile_strategy(config: &BacktestConfig, columns: &[String]) -> Result<Strategy, ValidationReport> {
    let mut report = ValidationReport::new();

    check_base_balance(config, &mut report);
    check_commission(config, &mut report);
    check_lot_size(config, &mut report);
    check_trailing_stop(config, columns, &mut report);
    check_window(config, &mut report);
    check_required_groups(config, &mut report);

    let mut strategy = Strategy::default();
    for group in LogicGroup::ALL {
        for (i, spec) in config.group(group).iter().enumerate() {
            let key = format!("{}[{}]", group.key(), i);
            if let Some(clause) = compile_clause(spec, columns, &key, &mut report) {
                strategy.max_lookback = strategy.max_lookback.max(clause.lookback);
                strategy.group_mut(group).push(clause);
            }
        }
    }

    if !report.is_empty() {
        return Err(report);
    }

    if config.uses_trailing_stop() {
        strategy.trailing_stop_column = columns.iter().position(|c| c == TRAILING_STOP_COLUMN);
    }
    warn_without_exit(config);
    Ok(strategy)
}

pub fn validate_config(config: &BacktestConfig, columns: &[String]) -> Result<(), FastTradeError> {
    compile_strategy(config, columns)
        .map(|_| ())
        .map_err(FastTradeError::Validation)
}

fn compile_clause(
    spec: &ClauseSpec,
    columns: &[String],
    key: &str,
    report: &mut ValidationReport,
) -> Option<Clause> {
    let operator = Operator::parse(&spec.operator);
    if operator.is_none() {
        report.push(
            key,
            format!(
                "unknown operator '{}', expected one of >, <, =, !=, >=, <=",
                spec.operator
            ),
        );
    }

    let lookback = match spec.lookback {
        Some(n) if n < 0 => {
            report.push(key, format!("lookback must be non-negative, got {n}"));
            None
        }
        Some(n) => Some(n as usize),
        None => Some(0),
    };

    let mut resolve = |term: &Term| match Operand::resolve(term, columns) {
        Ok(operand) => Some(operand),
        Err(FastTradeError::FieldNotFound { field }) => {
            report.push(key, format!("unknown field '{field}'"));
            None
        }
        Err(e) => {
            report.push(key, e.to_string());
            None
        }
    };
    let left = resolve(&spec.left);
    let right = resolve(&spec.right);

    Some(Clause::new(left?, operator?, right?).with_lookback(lookback?))
}

fn check_base_balance(config: &BacktestConfig, report: &mut ValidationReport) {
    if !(config.base_balance > 0.0) || !config.base_balance.is_finite() {
        report.push("base_balance", "base_balance must be a positive number");
    }
}

fn check_commission(config: &BacktestConfig, report: &mut ValidationReport) {
    if !(0.0..100.0).contains(&config.commission) {
        report.push("commission", "commission must be a percentage in [0, 100)");
    }
}

fn check_lot_size(config: &BacktestConfig, report: &mut ValidationReport) {
    if !(config.lot_size_perc > 0.0 && config.lot_size_perc <= 1.0) {
        report.push("lot_size_perc", "lot_size_perc must be in (0, 1]");
    }
    if !(config.max_lot_size >= 0.0) {
        report.push("max_lot_size", "max_lot_size must be non-negative (0 = unbounded)");
    }
}

fn check_trailing_stop(config: &BacktestConfig, columns: &[String], report: &mut ValidationReport) {
    if !(0.0..1.0).contains(&config.trailing_stop_loss) {
        report.push("trailing_stop_loss", "trailing_stop_loss must be a fraction in [0, 1)");
        return;
    }
    if config.uses_trailing_stop() && !columns.iter().any(|c| c == TRAILING_STOP_COLUMN) {
        report.push(
            "trailing_stop_loss",
            format!("column '{TRAILING_STOP_COLUMN}' is not present"),
        );
    }
}

fn check_window(config: &BacktestConfig, report: &mut ValidationReport) {
    let start = check_time(config.start.as_deref(), "start", report);
    let stop = check_time(config.stop.as_deref(), "stop", report);
    if let (Some(start), Some(stop)) = (start, stop) {
        if start > stop {
            report.push("start", "start must not be after stop");
        }
    }
}

fn check_time(value: Option<&str>, field: &str, report: &mut ValidationReport) -> Option<chrono::NaiveDateTime> {
    let value = value?;
    let parsed = parse_timestamp(value);
    if parsed.is_none() {
        report.push(field, format!("cannot parse '{value}' as a date or time"));
    }
    parsed
}

fn check_required_groups(config: &BacktestConfig, report: &mut ValidationReport) {
    if config.enter.is_empty() && config.any_enter.is_empty() {
        report.push("enter", "at least one of enter or any_enter must contain a clause");
    }
}

fn warn_without_exit(config: &BacktestConfig) {
    let has_exit = !config.exit.is_empty() || !config.any_exit.is_empty() || !config.hard_exit.is_empty();
    if !has_exit && !config.uses_trailing_stop() && !config.exit_on_end {
        warn!(
            strategy = %config.name,
            "strategy has no exit logic, no trailing stop and exit_on_end disabled; positions never close"
        );
    }
}
