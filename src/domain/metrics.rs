//! Performance summary of a finished run.
//!
//! Everything here is a pure function of the ledger and the trade log.
//! Degenerate inputs (single bar, no trades, zero variance) produce `0.0`
//! rather than NaN or infinity, and every float is rounded to 3 decimals so
//! summaries compare byte-for-byte across runs.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use serde::Serialize;
use serde_json::Value;

use crate::domain::bar::{format_timestamp, infer_interval};
use crate::domain::simulator::{LedgerRow, round_to};
use crate::domain::trade_log::TradeLogEntry;

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;
const VAR_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub return_perc: f64,
    pub buy_and_hold_perc: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub value_at_risk_95: f64,
    pub annualized_volatility: f64,

    pub equity_peak: f64,
    pub equity_final: f64,
    /// Largest peak-to-trough drop of the equity curve, in base currency.
    pub max_drawdown: f64,
    pub total_fees: f64,

    pub num_trades: usize,
    pub total_num_winning_trades: usize,
    pub total_num_losing_trades: usize,
    pub win_perc: f64,
    pub loss_perc: f64,
    pub avg_win_perc: f64,
    pub avg_loss_perc: f64,
    pub best_trade_perc: f64,
    pub min_trade_perc: f64,
    pub median_trade_perc: f64,
    pub mean_trade_perc: f64,

    /// Seconds between consecutive trade log rows.
    pub mean_trade_len: f64,
    pub median_trade_len: f64,
    pub max_trade_held: f64,
    pub min_trade_len: f64,

    pub first_tic: String,
    pub last_tic: String,
    pub total_tics: usize,
    pub perc_missing: f64,
    pub total_missing: usize,

    pub trade_quality: TradeQuality,
    pub trade_streaks: TradeStreaks,
    pub drawdown_metrics: DrawdownMetrics,
    pub time_analysis: TimeAnalysis,
    pub commission_impact: CommissionImpact,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeQuality {
    pub profit_factor: f64,
    pub avg_win_loss_ratio: f64,
    pub expectancy_perc: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStreaks {
    pub current_win_streak: usize,
    pub current_loss_streak: usize,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,
    pub avg_win_streak: f64,
    pub avg_loss_streak: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawdownMetrics {
    pub max_drawdown_perc: f64,
    pub avg_drawdown_perc: f64,
    pub current_drawdown_perc: f64,
    /// In bars.
    pub max_drawdown_duration: usize,
    pub avg_drawdown_duration: f64,
    pub total_drawdown_periods: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    pub periods: usize,
    pub best_return_perc: f64,
    pub worst_return_perc: f64,
    pub avg_return_perc: f64,
    pub profitable_perc: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeAnalysis {
    pub hourly: PeriodStats,
    pub daily: PeriodStats,
    pub monthly: PeriodStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommissionImpact {
    pub total_fees: f64,
    pub fees_perc_of_equity: f64,
    pub profitable_after_fees: usize,
    pub unprofitable_after_fees: usize,
    /// Trades that would have been winners without their own fee.
    pub trades_lost_to_fees: usize,
}

impl Summary {
    pub fn compute(rows: &[LedgerRow], trade_log: &[TradeLogEntry]) -> Self {
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Summary::default();
        };
        let real: Vec<&LedgerRow> = rows.iter().filter(|r| !r.synthetic).collect();
        let equity: Vec<f64> = rows.iter().map(|r| r.adjusted_account_value).collect();
        let returns: Vec<f64> = rows
            .iter()
            .map(|r| r.adjusted_account_value_change_perc)
            .filter(|r| r.is_finite())
            .collect();
        let interval = infer_interval(real.iter().map(|r| r.bar.time));

        let drawdown = compute_drawdown(&equity);
        let return_perc = relative_change_perc(first.adjusted_account_value, last.adjusted_account_value);
        let total_fees = rows.iter().map(|r| r.fee).sum::<f64>();
        let equity_final = last.adjusted_account_value;
        let (total_missing, perc_missing) = missing_bars(&real, interval);

        let trade_perc: Vec<f64> = trade_log.iter().map(|t| t.change_perc).collect();
        let wins: Vec<f64> = trade_perc.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = trade_perc.iter().copied().filter(|p| *p < 0.0).collect();
        let num_trades = trade_log.len();
        let win_perc = ratio_perc(wins.len(), num_trades);
        let loss_perc = ratio_perc(losses.len(), num_trades);
        let avg_win_perc = mean(&wins);
        let avg_loss_perc = mean(&losses);

        let held: Vec<f64> = trade_log
            .windows(2)
            .map(|w| (w[1].time - w[0].time).num_seconds() as f64)
            .collect();

        let summary = Summary {
            return_perc,
            buy_and_hold_perc: buy_and_hold_perc(&real),
            sharpe_ratio: sharpe_ratio(&returns),
            sortino_ratio: sortino_ratio(&returns),
            calmar_ratio: if drawdown.max_drawdown_perc > 0.0 {
                return_perc / drawdown.max_drawdown_perc
            } else {
                0.0
            },
            value_at_risk_95: value_at_risk(&returns, VAR_CONFIDENCE),
            annualized_volatility: annualized_volatility(&returns, interval),

            equity_peak: equity.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            equity_final,
            max_drawdown: max_drawdown_amount(&equity),
            total_fees,

            num_trades,
            total_num_winning_trades: wins.len(),
            total_num_losing_trades: losses.len(),
            win_perc,
            loss_perc,
            avg_win_perc,
            avg_loss_perc,
            best_trade_perc: trade_perc.iter().copied().fold(f64::NAN, f64::max),
            min_trade_perc: trade_perc.iter().copied().fold(f64::NAN, f64::min),
            median_trade_perc: median(&trade_perc),
            mean_trade_perc: mean(&trade_perc),

            mean_trade_len: mean(&held),
            median_trade_len: median(&held),
            max_trade_held: held.iter().copied().fold(f64::NAN, f64::max),
            min_trade_len: held.iter().copied().fold(f64::NAN, f64::min),

            first_tic: real.first().map(|r| format_timestamp(&r.bar.time)).unwrap_or_default(),
            last_tic: real.last().map(|r| format_timestamp(&r.bar.time)).unwrap_or_default(),
            total_tics: real.len(),
            perc_missing,
            total_missing,

            trade_quality: TradeQuality {
                profit_factor: profit_factor(&trade_perc),
                avg_win_loss_ratio: if avg_loss_perc < 0.0 {
                    avg_win_perc / avg_loss_perc.abs()
                } else {
                    0.0
                },
                expectancy_perc: win_perc / 100.0 * avg_win_perc + loss_perc / 100.0 * avg_loss_perc,
            },
            trade_streaks: compute_streaks(&trade_perc),
            drawdown_metrics: drawdown,
            time_analysis: TimeAnalysis {
                hourly: period_stats(rows, |t| (t.year(), t.ordinal(), t.hour())),
                daily: period_stats(rows, |t| (t.year(), t.ordinal(), 0)),
                monthly: period_stats(rows, |t| (t.year(), t.month(), 0)),
            },
            commission_impact: commission_impact(trade_log, total_fees, equity_final),
        };
        summary.rounded()
    }

    /// Nested JSON form used for rule lookups and reports.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    fn rounded(mut self) -> Self {
        let r = |v: &mut f64| *v = round3(*v);
        for v in [
            &mut self.return_perc,
            &mut self.buy_and_hold_perc,
            &mut self.sharpe_ratio,
            &mut self.sortino_ratio,
            &mut self.calmar_ratio,
            &mut self.value_at_risk_95,
            &mut self.annualized_volatility,
            &mut self.equity_peak,
            &mut self.equity_final,
            &mut self.max_drawdown,
            &mut self.total_fees,
            &mut self.win_perc,
            &mut self.loss_perc,
            &mut self.avg_win_perc,
            &mut self.avg_loss_perc,
            &mut self.best_trade_perc,
            &mut self.min_trade_perc,
            &mut self.median_trade_perc,
            &mut self.mean_trade_perc,
            &mut self.mean_trade_len,
            &mut self.median_trade_len,
            &mut self.max_trade_held,
            &mut self.min_trade_len,
            &mut self.trade_quality.profit_factor,
            &mut self.trade_quality.avg_win_loss_ratio,
            &mut self.trade_quality.expectancy_perc,
            &mut self.trade_streaks.avg_win_streak,
            &mut self.trade_streaks.avg_loss_streak,
            &mut self.drawdown_metrics.max_drawdown_perc,
            &mut self.drawdown_metrics.avg_drawdown_perc,
            &mut self.drawdown_metrics.current_drawdown_perc,
            &mut self.drawdown_metrics.avg_drawdown_duration,
            &mut self.commission_impact.total_fees,
            &mut self.commission_impact.fees_perc_of_equity,
        ] {
            r(v);
        }
        for stats in [
            &mut self.time_analysis.hourly,
            &mut self.time_analysis.daily,
            &mut self.time_analysis.monthly,
        ] {
            r(&mut stats.best_return_perc);
            r(&mut stats.worst_return_perc);
            r(&mut stats.avg_return_perc);
            r(&mut stats.profitable_perc);
        }
        self
    }
}

/// Round to 3 decimals, mapping NaN and infinities to `0.0`.
fn round3(value: f64) -> f64 {
    if value.is_finite() { round_to(value, 3) } else { 0.0 }
}

fn relative_change_perc(from: f64, to: f64) -> f64 {
    if from != 0.0 && from.is_finite() && to.is_finite() {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

fn ratio_perc(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation; `0.0` with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn buy_and_hold_perc(rows: &[&LedgerRow]) -> f64 {
    let mut closes = rows.iter().map(|r| r.bar.close).filter(|c| c.is_finite());
    let first = closes.next();
    let last = closes.last().or(first);
    match (first, last) {
        (Some(first), Some(last)) => relative_change_perc(first, last),
        _ => 0.0,
    }
}

/// Mean over standard deviation of per-bar returns, scaled by √n.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let std = sample_std(returns);
    if std > 0.0 {
        mean(returns) / std * (returns.len() as f64).sqrt()
    } else {
        0.0
    }
}

/// Like [`sharpe_ratio`] but only penalizing negative returns.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside = returns
        .iter()
        .filter(|r| **r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / returns.len() as f64;
    let downside_dev = downside.sqrt();
    if downside_dev > 0.0 {
        mean(returns) / downside_dev * (returns.len() as f64).sqrt()
    } else {
        0.0
    }
}

/// Historical value at risk: the `1 - confidence` quantile of the per-bar
/// returns, linearly interpolated.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (1.0 - confidence) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Per-bar return volatility scaled to a year of bars at `interval`.
pub fn annualized_volatility(returns: &[f64], interval: Option<Duration>) -> f64 {
    let Some(secs) = interval.map(|d| d.num_seconds()).filter(|s| *s > 0) else {
        return 0.0;
    };
    let bars_per_year = SECONDS_PER_YEAR / secs as f64;
    sample_std(returns) * bars_per_year.sqrt()
}

fn max_drawdown_amount(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        max_dd = max_dd.max(peak - value);
    }
    max_dd
}

/// Drawdown depth (as a positive percentage of the running peak) and
/// duration over contiguous below-peak runs.
pub fn compute_drawdown(equity: &[f64]) -> DrawdownMetrics {
    let mut peak = f64::NEG_INFINITY;
    let mut periods: Vec<(f64, usize)> = Vec::new();
    let mut current: Option<(f64, usize)> = None;
    let mut depth = 0.0;

    for &value in equity {
        peak = peak.max(value);
        depth = if peak > 0.0 { (peak - value) / peak * 100.0 } else { 0.0 };
        if depth > 1e-9 {
            let (worst, len) = current.get_or_insert((0.0, 0));
            *worst = worst.max(depth);
            *len += 1;
        } else if let Some(done) = current.take() {
            periods.push(done);
        }
    }
    periods.extend(current);

    let depths: Vec<f64> = periods.iter().map(|(d, _)| *d).collect();
    let durations: Vec<f64> = periods.iter().map(|(_, n)| *n as f64).collect();
    DrawdownMetrics {
        max_drawdown_perc: depths.iter().copied().fold(0.0, f64::max),
        avg_drawdown_perc: mean(&depths),
        current_drawdown_perc: depth,
        max_drawdown_duration: periods.iter().map(|(_, n)| *n).max().unwrap_or(0),
        avg_drawdown_duration: mean(&durations),
        total_drawdown_periods: periods.len(),
    }
}

/// Gross gains over gross losses of the trade log; `0.0` without losses.
pub fn profit_factor(trade_perc: &[f64]) -> f64 {
    let gains: f64 = trade_perc.iter().filter(|p| **p > 0.0).sum();
    let losses: f64 = trade_perc.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();
    if losses > 0.0 { gains / losses } else { 0.0 }
}

pub fn compute_streaks(trade_perc: &[f64]) -> TradeStreaks {
    let mut win_runs: Vec<usize> = Vec::new();
    let mut loss_runs: Vec<usize> = Vec::new();
    let mut run: Option<(bool, usize)> = None;

    for &perc in trade_perc.iter().filter(|p| **p != 0.0) {
        let win = perc > 0.0;
        run = match run {
            Some((w, n)) if w == win => Some((w, n + 1)),
            Some((w, n)) => {
                if w { win_runs.push(n) } else { loss_runs.push(n) }
                Some((win, 1))
            }
            None => Some((win, 1)),
        };
    }
    let (current_win_streak, current_loss_streak) = match run {
        Some((true, n)) => (n, 0),
        Some((false, n)) => (0, n),
        None => (0, 0),
    };
    if let Some((w, n)) = run {
        if w { win_runs.push(n) } else { loss_runs.push(n) }
    }

    let avg = |runs: &[usize]| {
        if runs.is_empty() {
            0.0
        } else {
            runs.iter().sum::<usize>() as f64 / runs.len() as f64
        }
    };
    TradeStreaks {
        current_win_streak,
        current_loss_streak,
        longest_win_streak: win_runs.iter().copied().max().unwrap_or(0),
        longest_loss_streak: loss_runs.iter().copied().max().unwrap_or(0),
        avg_win_streak: avg(&win_runs),
        avg_loss_streak: avg(&loss_runs),
    }
}

/// Returns per calendar bucket: each bucket's closing equity against the
/// previous bucket's (the first row's equity for the first bucket).
fn period_stats<K, F>(rows: &[LedgerRow], key: F) -> PeriodStats
where
    K: Ord,
    F: Fn(&NaiveDateTime) -> K,
{
    let Some(first) = rows.first() else {
        return PeriodStats::default();
    };
    let mut closing: BTreeMap<K, f64> = BTreeMap::new();
    for row in rows {
        closing.insert(key(&row.bar.time), row.adjusted_account_value);
    }

    let mut previous = first.adjusted_account_value;
    let returns: Vec<f64> = closing
        .values()
        .map(|&value| {
            let r = relative_change_perc(previous, value);
            previous = value;
            r
        })
        .collect();

    let profitable = returns.iter().filter(|r| **r > 0.0).count();
    PeriodStats {
        periods: returns.len(),
        best_return_perc: returns.iter().copied().fold(f64::NAN, f64::max),
        worst_return_perc: returns.iter().copied().fold(f64::NAN, f64::min),
        avg_return_perc: mean(&returns),
        profitable_perc: ratio_perc(profitable, returns.len()),
    }
}

fn commission_impact(trade_log: &[TradeLogEntry], total_fees: f64, equity_final: f64) -> CommissionImpact {
    let profitable = trade_log.iter().filter(|t| t.change > 0.0).count();
    let unprofitable = trade_log.iter().filter(|t| t.change < 0.0).count();
    let lost_to_fees = trade_log
        .iter()
        .filter(|t| t.change <= 0.0 && t.change + t.fee > 0.0)
        .count();
    CommissionImpact {
        total_fees,
        fees_perc_of_equity: if equity_final > 0.0 {
            total_fees / equity_final * 100.0
        } else {
            0.0
        },
        profitable_after_fees: profitable,
        unprofitable_after_fees: unprofitable,
        trades_lost_to_fees: lost_to_fees,
    }
}

/// Bars absent from the series given its inferred interval, plus bars
/// whose close is missing. Returns the count and its share of the
/// expected bars in percent (2 decimals).
fn missing_bars(rows: &[&LedgerRow], interval: Option<Duration>) -> (usize, f64) {
    let nan_closes = rows.iter().filter(|r| r.bar.close.is_nan()).count();
    let step = interval.map(|d| d.num_seconds()).filter(|s| *s > 0);
    let gaps: usize = match step {
        Some(step) => rows
            .windows(2)
            .map(|w| {
                let secs = (w[1].bar.time - w[0].bar.time).num_seconds();
                usize::try_from(secs / step - 1).unwrap_or(0)
            })
            .sum(),
        None => 0,
    };
    let total_missing = gaps + nan_closes;
    let expected = rows.len() + gaps;
    let perc = if expected > 0 {
        round_to(total_missing as f64 / expected as f64 * 100.0, 2)
    } else {
        0.0
    };
    (total_missing, perc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::Action;
    use crate::domain::bar::OhlcvBar;
    use crate::domain::simulator::simulate;
    use crate::domain::strategy::BacktestConfig;
    use crate::domain::trade_log::extract_trade_log;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn run(closes: &[f64], symbols: &[&str], commission: f64) -> (Vec<LedgerRow>, Vec<TradeLogEntry>) {
        let bars: Vec<OhlcvBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar::new(start() + Duration::minutes(i as i64), c, c, c, c, 1.0))
            .collect();
        let actions: Vec<Action> = symbols
            .iter()
            .map(|s| Action::from_symbol(s).unwrap())
            .collect();
        let config = BacktestConfig {
            commission,
            exit_on_end: false,
            ..BacktestConfig::default()
        };
        let rows = simulate(&bars, &actions, &config, None);
        let log = extract_trade_log(&rows, config.base_balance);
        (rows, log)
    }

    fn reference() -> Summary {
        let (rows, log) = run(
            &[10.0, 11.0, 12.0, 12.0, 13.0, 10.0, 15.0, 15.0, 14.0],
            &["e", "h", "x", "x", "x", "e", "x", "h", "h"],
            0.0,
        );
        Summary::compute(&rows, &log)
    }

    #[test]
    fn reference_scenario_summary() {
        let s = reference();
        assert_eq!(s.return_perc, 80.0);
        assert_eq!(s.buy_and_hold_perc, 40.0);
        assert_eq!(s.num_trades, 2);
        assert_eq!(s.total_num_winning_trades, 2);
        assert_eq!(s.total_num_losing_trades, 0);
        assert_eq!(s.win_perc, 100.0);
        assert_eq!(s.best_trade_perc, 50.0);
        assert_eq!(s.min_trade_perc, 20.0);
        assert_eq!(s.mean_trade_perc, 35.0);
        assert_eq!(s.median_trade_perc, 35.0);
        assert_eq!(s.mean_trade_len, 240.0);
        assert_eq!(s.equity_peak, 1800.0);
        assert_eq!(s.equity_final, 1800.0);
        assert_eq!(s.max_drawdown, 0.0);
        assert_eq!(s.calmar_ratio, 0.0);
        assert_eq!(s.trade_quality.profit_factor, 0.0);
        assert_eq!(s.trade_streaks.longest_win_streak, 2);
        assert_eq!(s.trade_streaks.current_win_streak, 2);
        assert_eq!(s.first_tic, "2024-01-01 00:00:00");
        assert_eq!(s.last_tic, "2024-01-01 00:08:00");
        assert_eq!(s.total_tics, 9);
        assert_eq!(s.total_missing, 0);
        assert!(s.sharpe_ratio > 0.0);
    }

    #[test]
    fn summary_is_deterministic() {
        let a = serde_json::to_string(&reference()).unwrap();
        let b = serde_json::to_string(&reference()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_bar_is_all_zeros_not_nan() {
        let (rows, log) = run(&[10.0], &["h"], 0.0);
        let s = Summary::compute(&rows, &log);
        assert_eq!(s.sharpe_ratio, 0.0);
        assert_eq!(s.sortino_ratio, 0.0);
        assert_eq!(s.annualized_volatility, 0.0);
        assert_eq!(s.best_trade_perc, 0.0);
        assert_eq!(s.mean_trade_len, 0.0);
        assert_eq!(s.time_analysis.daily.periods, 1);
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("null"));
    }

    #[test]
    fn empty_ledger_gives_default() {
        assert_eq!(Summary::compute(&[], &[]), Summary::default());
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        let returns = [1.0, -1.0, 2.0, 0.0];
        // mean 0.5, sample std sqrt(5/3)
        let expected = 0.5 / (5.0_f64 / 3.0).sqrt() * 2.0;
        assert_relative_eq!(sharpe_ratio(&returns), expected, epsilon = 1e-12);
        assert_eq!(sharpe_ratio(&[1.0, 1.0, 1.0]), 0.0);
        assert_eq!(sharpe_ratio(&[]), 0.0);
    }

    #[test]
    fn sortino_without_losses_is_zero() {
        assert_eq!(sortino_ratio(&[1.0, 2.0, 3.0]), 0.0);
        assert!(sortino_ratio(&[2.0, -1.0, 3.0]) > 0.0);
    }

    #[test]
    fn value_at_risk_interpolates() {
        let returns: Vec<f64> = (0..21).map(|i| i as f64 - 10.0).collect();
        assert_relative_eq!(value_at_risk(&returns, 0.95), -9.0);
        assert_eq!(value_at_risk(&[], 0.95), 0.0);
        assert_eq!(value_at_risk(&[-3.0], 0.95), -3.0);
    }

    #[test]
    fn volatility_needs_an_interval() {
        assert_eq!(annualized_volatility(&[1.0, -1.0], None), 0.0);
        let daily = annualized_volatility(&[1.0, -1.0], Some(Duration::days(1)));
        assert_relative_eq!(daily, 2.0_f64.sqrt() * 365.25_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn drawdown_periods() {
        let dd = compute_drawdown(&[100.0, 90.0, 95.0, 100.0, 80.0, 120.0, 108.0]);
        assert_eq!(dd.total_drawdown_periods, 3);
        assert_relative_eq!(dd.max_drawdown_perc, 20.0, epsilon = 1e-9);
        assert_relative_eq!(dd.avg_drawdown_perc, (10.0 + 20.0 + 10.0) / 3.0, epsilon = 1e-9);
        assert_eq!(dd.max_drawdown_duration, 2);
        assert_relative_eq!(dd.current_drawdown_perc, 10.0, epsilon = 1e-9);
        assert_eq!(max_drawdown_amount(&[100.0, 90.0, 95.0, 100.0, 80.0, 120.0, 108.0]), 20.0);
    }

    #[test]
    fn flat_curve_has_no_drawdown() {
        let dd = compute_drawdown(&[100.0, 100.0, 100.0]);
        assert_eq!(dd, DrawdownMetrics::default());
    }

    #[test]
    fn streaks_follow_trade_order() {
        let s = compute_streaks(&[1.0, 2.0, -1.0, 3.0, 4.0, 5.0, -2.0, -3.0]);
        assert_eq!(s.longest_win_streak, 3);
        assert_eq!(s.longest_loss_streak, 2);
        assert_eq!(s.current_loss_streak, 2);
        assert_eq!(s.current_win_streak, 0);
        assert_relative_eq!(s.avg_win_streak, 2.5);
        assert_relative_eq!(s.avg_loss_streak, 1.5);
    }

    #[test]
    fn profit_factor_ratio() {
        assert_relative_eq!(profit_factor(&[10.0, -5.0, 5.0]), 3.0);
        assert_eq!(profit_factor(&[10.0]), 0.0);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn losing_trade_statistics() {
        let (rows, log) = run(&[10.0, 8.0, 10.0, 12.0], &["e", "x", "e", "x"], 0.0);
        let s = Summary::compute(&rows, &log);
        assert_eq!(s.num_trades, 2);
        assert_eq!(s.total_num_losing_trades, 1);
        assert_eq!(s.avg_loss_perc, -20.0);
        assert_eq!(s.avg_win_perc, 20.0);
        assert_eq!(s.trade_quality.avg_win_loss_ratio, 1.0);
        assert_eq!(s.trade_quality.expectancy_perc, 0.0);
        assert_eq!(s.max_drawdown, 200.0);
        assert_eq!(s.drawdown_metrics.max_drawdown_perc, 20.0);
    }

    #[test]
    fn fees_are_reported() {
        let (rows, log) = run(&[10.0, 10.0], &["e", "x"], 1.0);
        let s = Summary::compute(&rows, &log);
        assert_eq!(s.total_fees, 19.9);
        assert_eq!(s.commission_impact.total_fees, 19.9);
        assert_eq!(s.commission_impact.unprofitable_after_fees, 2);
        assert_eq!(s.commission_impact.trades_lost_to_fees, 0);
        assert_relative_eq!(s.commission_impact.fees_perc_of_equity, 2.03, epsilon = 1e-3);
    }

    #[test]
    fn gaps_count_as_missing() {
        let times = [0, 1, 2, 5, 6];
        let rows: Vec<LedgerRow> = times
            .iter()
            .map(|&m| {
                let bar = OhlcvBar::new(start() + Duration::minutes(m), 1.0, 1.0, 1.0, 1.0, 1.0);
                LedgerRow {
                    bar,
                    action: Action::Hold,
                    in_trade: false,
                    aux: 0.0,
                    account_value: 1000.0,
                    adjusted_account_value: 1000.0,
                    adjusted_account_value_change: 0.0,
                    adjusted_account_value_change_perc: 0.0,
                    fee: 0.0,
                    synthetic: false,
                }
            })
            .collect();
        let s = Summary::compute(&rows, &[]);
        assert_eq!(s.total_missing, 2);
        assert_eq!(s.perc_missing, round_to(2.0 / 7.0 * 100.0, 2));
    }

    #[test]
    fn nested_groups_are_reachable_in_json() {
        let value = reference().to_value();
        assert!(value["trade_streaks"]["avg_win_streak"].is_number());
        assert!(value["time_analysis"]["daily"]["periods"].is_number());
        assert!(value["commission_impact"]["total_fees"].is_number());
    }
}
