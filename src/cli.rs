//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

use crate::adapters::csv_adapter::{read_csv_file, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::report_adapter::FileReportAdapter;
use crate::domain::backtest::{self as engine, BacktestResult};
use crate::domain::bar::PRICE_FIELDS;
use crate::domain::clause::ClauseSpec;
use crate::domain::clause_parser::parse_clause_list;
use crate::domain::config_validation::compile_strategy;
use crate::domain::error::{FastTradeError, ValidationReport};
use crate::domain::strategy::{BacktestConfig, LogicGroup};
use crate::domain::transformer::{TransformerRegistry, TRAILING_STOP_COLUMN};
use crate::logging::{init_logging, LogFormat};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const SECTION: &str = "backtest";

#[derive(Parser, Debug)]
#[command(name = "fasttrade", about = "Rule-driven backtest simulator")]
pub struct Cli {
    /// Log output format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one strategy over one CSV file
    Backtest {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        rules: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run one strategy over every symbol in a directory of CSV files
    Batch {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        data_dir: PathBuf,
        /// Comma-separated symbols; all CSV files when omitted
        #[arg(long)]
        symbols: Option<String>,
        #[arg(short, long)]
        rules: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
        /// Comma-separated indicator columns the data will carry
        #[arg(long)]
        columns: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_format, Level::INFO);

    let outcome = match cli.command {
        Command::Backtest {
            strategy,
            data,
            rules,
            output,
        } => run_backtest(&strategy, &data, rules.as_deref(), output.as_deref()),
        Command::Batch {
            strategy,
            data_dir,
            symbols,
            rules,
            output,
        } => run_batch(
            &strategy,
            &data_dir,
            symbols.as_deref(),
            rules.as_deref(),
            output.as_deref(),
        ),
        Command::Validate { strategy, columns } => run_validate(&strategy, columns.as_deref()),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Load a strategy from `.json` or INI.
pub fn load_strategy(path: &Path) -> Result<BacktestConfig, FastTradeError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let text = fs::read_to_string(path)?;
        return serde_json::from_str(&text).map_err(|e| FastTradeError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        });
    }
    let adapter = FileConfigAdapter::from_file(path)?;
    build_backtest_config(&adapter)
}

/// Build a configuration from the `[backtest]` section. Logic groups are
/// `;`-separated textual clauses.
pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, FastTradeError> {
    if !adapter.has_section(SECTION) {
        let mut report = ValidationReport::new();
        report.push(SECTION, "missing [backtest] section");
        return Err(report.into());
    }

    let defaults = BacktestConfig::default();
    let mut report = ValidationReport::new();
    let mut number = |key: &str, default: f64| {
        let raw = adapter.get_string(SECTION, key);
        if let Some(raw) = raw.filter(|r| r.trim().parse::<f64>().is_err()) {
            report.push(key, format!("'{raw}' is not a number"));
        }
        adapter.get_double(SECTION, key, default)
    };

    let mut config = BacktestConfig {
        name: adapter.get_string(SECTION, "name").unwrap_or_default(),
        base_balance: number("base_balance", defaults.base_balance),
        commission: number("commission", defaults.commission),
        lot_size_perc: number("lot_size_perc", defaults.lot_size_perc),
        max_lot_size: number("max_lot_size", defaults.max_lot_size),
        trailing_stop_loss: number("trailing_stop_loss", defaults.trailing_stop_loss),
        exit_on_end: adapter.get_bool(SECTION, "exit_on_end", defaults.exit_on_end),
        start: adapter.get_string(SECTION, "start").filter(|s| !s.trim().is_empty()),
        stop: adapter.get_string(SECTION, "stop").filter(|s| !s.trim().is_empty()),
        ..defaults
    };
    if !report.is_empty() {
        return Err(report.into());
    }

    for group in LogicGroup::ALL {
        *config.group_mut(group) = parse_group(adapter, group)?;
    }
    Ok(config)
}

fn parse_group(adapter: &dyn ConfigPort, group: LogicGroup) -> Result<Vec<ClauseSpec>, FastTradeError> {
    let raw = adapter.get_string(SECTION, group.key()).unwrap_or_default();
    parse_clause_list(&raw).map_err(|e| {
        eprintln!(
            "error: failed to parse {}:\n{}",
            group.key(),
            e.display_with_context(&raw)
        );
        FastTradeError::from(e)
    })
}

/// Rules are a JSON array of `[key, operator, value]` arrays.
pub fn load_rules(path: &Path) -> Result<Vec<Value>, FastTradeError> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(rules) => Ok(rules),
        _ => Err(FastTradeError::ConfigParse {
            file: path.display().to_string(),
            reason: "rules must be a JSON array".into(),
        }),
    }
}

fn load_optional_rules(path: Option<&Path>) -> Result<Option<Vec<Value>>, FastTradeError> {
    path.map(load_rules).transpose()
}

fn run_backtest(
    strategy_path: &Path,
    data_path: &Path,
    rules_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<ExitCode, FastTradeError> {
    eprintln!("Loading strategy from {}", strategy_path.display());
    let config = load_strategy(strategy_path)?;
    let rules = load_optional_rules(rules_path)?;

    eprintln!("Loading data from {}", data_path.display());
    let series = read_csv_file(data_path)?;
    let result = engine::run_backtest(&config, &series, rules.as_deref())?;

    let symbol = data_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backtest".to_string());
    print_summary(&symbol, &result);

    if let Some(dir) = output {
        FileReportAdapter::new(dir.to_path_buf()).write(&result, &symbol)?;
        eprintln!("Report written to {}", dir.join(&symbol).display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_batch(
    strategy_path: &Path,
    data_dir: &Path,
    symbols: Option<&str>,
    rules_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<ExitCode, FastTradeError> {
    let config = load_strategy(strategy_path)?;
    let rules = load_optional_rules(rules_path)?;
    let data = CsvAdapter::new(data_dir.to_path_buf());
    let symbols = match symbols {
        Some(list) => parse_list(list),
        None => data.list_symbols()?,
    };
    if symbols.is_empty() {
        return Err(FastTradeError::Data {
            reason: format!("no symbols found in {}", data_dir.display()),
        });
    }

    eprintln!("Running {} symbols...", symbols.len());
    let results = engine::run_batch(
        &config,
        &symbols,
        &data,
        &TransformerRegistry::new(),
        rules.as_deref(),
    );

    let mut first_error = None;
    for (symbol, result) in &results {
        match result {
            Ok(result) => print_summary(symbol, result),
            Err(e) => {
                eprintln!("error: {symbol}: {e}");
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(dir) = output {
        let written = FileReportAdapter::new(dir.to_path_buf()).write_batch(&results)?;
        eprintln!("{written} report(s) written to {}", dir.display());
    }

    let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
    eprintln!("{succeeded}/{} symbols completed", results.len());
    match first_error {
        Some(e) if succeeded == 0 => Ok(ExitCode::from(e)),
        _ => Ok(ExitCode::SUCCESS),
    }
}

fn run_validate(strategy_path: &Path, columns: Option<&str>) -> Result<ExitCode, FastTradeError> {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let config = load_strategy(strategy_path)?;
    let columns = validation_columns(&config, columns);

    match compile_strategy(&config, &columns) {
        Ok(strategy) => {
            for group in LogicGroup::ALL {
                let specs = config.group(group);
                if specs.is_empty() {
                    continue;
                }
                eprintln!("\n{}:", group.key());
                for spec in specs {
                    eprintln!("  {spec}");
                }
            }
            eprintln!(
                "\nStrategy configuration is valid ({} clauses, max lookback {}).",
                strategy.clause_count(),
                strategy.max_lookback
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(report) => Err(report.into()),
    }
}

/// Columns a strategy may reference: the declared data columns plus the
/// columns the engine derives itself.
pub fn validation_columns(config: &BacktestConfig, declared: Option<&str>) -> Vec<String> {
    let mut columns: Vec<String> = declared.map(parse_list).unwrap_or_default();
    columns.retain(|c| !PRICE_FIELDS.contains(&c.as_str()));
    let derived = config
        .indicators
        .iter()
        .map(|i| i.name.clone())
        .chain(config.uses_trailing_stop().then(|| TRAILING_STOP_COLUMN.to_string()));
    for column in derived {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn print_summary(symbol: &str, result: &BacktestResult) {
    let s = &result.summary;
    println!("== {symbol} ==");
    println!("  period:          {} .. {} ({} bars)", s.first_tic, s.last_tic, s.total_tics);
    println!("  return:          {:.3}%", s.return_perc);
    println!("  buy and hold:    {:.3}%", s.buy_and_hold_perc);
    println!("  trades:          {} ({:.3}% winning)", s.num_trades, s.win_perc);
    println!("  sharpe ratio:    {:.3}", s.sharpe_ratio);
    println!("  max drawdown:    {:.3}", s.max_drawdown);
    println!("  equity final:    {:.3}", s.equity_final);
    println!("  total fees:      {:.3}", s.total_fees);
    if let Some(rules) = &result.rules {
        println!(
            "  rules:           all_pass={} any_pass={} {:?}",
            rules.all_pass, rules.any_pass, rules.results
        );
    }
    println!("  elapsed:         {:?}", result.elapsed);
}
