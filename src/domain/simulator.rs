//! Position simulator.
//!
//! A two-state machine (flat / in trade) advanced once per bar in time
//! order. Every currency and quantity value is kept at 8 decimal places.
//!
//! # Transitions
//!
//! - entry action while flat: size the lot, buy at the close, take the
//!   commission out of the bought quantity
//! - exit action while in trade: sell the whole quantity at the close,
//!   take the commission out of the proceeds
//! - anything else carries the previous state forward with no fee
//!
//! Bars with a NaN close are marked to market at the last valid close.

use chrono::Duration;
use tracing::{debug, trace};

use crate::domain::action::Action;
use crate::domain::bar::OhlcvBar;
use crate::domain::strategy::BacktestConfig;

/// Decimal places for currency and quantity values.
pub const PRECISION: i32 = 8;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() { 0.0 } else { value };
    }
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn round8(value: f64) -> f64 {
    round_to(value, PRECISION)
}

fn floor8(value: f64) -> f64 {
    let factor = 10f64.powi(PRECISION);
    // absorb representation error (2.9999999999999996 -> 3) before flooring
    let scaled = (value * factor * 1e4).round() / 1e4;
    let floored = scaled.floor() / factor;
    if floored == 0.0 { 0.0 } else { floored }
}

/// Quantity of the traded asset `amount` buys at `price`, rounded down so
/// the spend never exceeds `amount`.
pub fn convert_base_to_aux(amount: f64, price: f64) -> f64 {
    if amount <= 0.0 || !(price > 0.0) || !amount.is_finite() || !price.is_finite() {
        return 0.0;
    }
    floor8(amount / price)
}

/// Base currency value of `quantity` at `price`.
pub fn convert_aux_to_base(quantity: f64, price: f64) -> f64 {
    if quantity == 0.0 || !price.is_finite() {
        return 0.0;
    }
    round8(quantity * price)
}

/// Account state threaded through the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Account {
    pub in_trade: bool,
    /// Uninvested base currency.
    pub account_value: f64,
    /// Held quantity of the traded asset; zero while flat.
    pub aux: f64,
}

impl Account {
    pub fn new(base_balance: f64) -> Self {
        Self {
            in_trade: false,
            account_value: round8(base_balance),
            aux: 0.0,
        }
    }

    /// Base currency committed by the next entry.
    pub fn trade_amount(&self, lot_size_perc: f64, max_lot_size: f64) -> f64 {
        let amount = self.account_value * lot_size_perc;
        let amount = if max_lot_size > 0.0 {
            amount.min(max_lot_size)
        } else {
            amount
        };
        round8(amount.min(self.account_value))
    }

    /// Open a position. Returns the fee in base currency, or `None` when
    /// the lot is too small to buy anything.
    pub fn enter(&mut self, price: f64, config: &BacktestConfig) -> Option<f64> {
        let amount = self.trade_amount(config.lot_size_perc, config.max_lot_size);
        let quantity = convert_base_to_aux(amount, price);
        if quantity <= 0.0 {
            return None;
        }
        let spent = round8(quantity * price).min(self.account_value);
        let fee_quantity = round8(quantity * config.commission / 100.0);

        self.account_value = round8(self.account_value - spent).max(0.0);
        self.aux = round8(quantity - fee_quantity);
        self.in_trade = true;
        Some(convert_aux_to_base(fee_quantity, price))
    }

    /// Close the position. Returns the fee in base currency.
    pub fn exit(&mut self, price: f64, commission: f64) -> f64 {
        let converted = convert_aux_to_base(self.aux, price);
        let fee = round8(converted * commission / 100.0);
        self.account_value = round8(self.account_value + converted - fee);
        self.aux = 0.0;
        self.in_trade = false;
        fee
    }

    /// Mark-to-market equity.
    pub fn adjusted_value(&self, price: f64) -> f64 {
        round8(self.account_value + convert_aux_to_base(self.aux, price))
    }
}

/// One row of the per-bar output table.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub bar: OhlcvBar,
    pub action: Action,
    pub in_trade: bool,
    pub aux: f64,
    pub account_value: f64,
    pub adjusted_account_value: f64,
    /// Change of `adjusted_account_value` from the previous row (from
    /// `base_balance` on the first row).
    pub adjusted_account_value_change: f64,
    pub adjusted_account_value_change_perc: f64,
    pub fee: f64,
    /// The forced exit row appended after the last real bar.
    pub synthetic: bool,
}

struct Run<'c> {
    config: &'c BacktestConfig,
    account: Account,
    last_price: f64,
    previous_adjusted: f64,
    rows: Vec<LedgerRow>,
}

impl<'c> Run<'c> {
    fn new(config: &'c BacktestConfig, capacity: usize) -> Self {
        let account = Account::new(config.base_balance);
        Self {
            config,
            account,
            last_price: f64::NAN,
            previous_adjusted: account.account_value,
            rows: Vec::with_capacity(capacity + 1),
        }
    }

    fn step(&mut self, bar: &OhlcvBar, action: Action, synthetic: bool) {
        if bar.close.is_finite() {
            self.last_price = bar.close;
        }
        let price = self.last_price;

        let mut fee = 0.0;
        if action.is_entry() && !self.account.in_trade {
            match self.account.enter(price, self.config) {
                Some(entry_fee) => {
                    fee = entry_fee;
                    trace!(time = %bar.time, price, aux = self.account.aux, "entered");
                }
                None => debug!(time = %bar.time, "entry skipped, nothing to buy"),
            }
        } else if action.is_exit() && self.account.in_trade && price.is_finite() {
            fee = self.account.exit(price, self.config.commission);
            trace!(time = %bar.time, price, account = self.account.account_value, "exited");
        }

        let adjusted = self.account.adjusted_value(price);
        let change = round8(adjusted - self.previous_adjusted);
        let change_perc = if self.previous_adjusted != 0.0 {
            change / self.previous_adjusted * 100.0
        } else {
            0.0
        };
        self.previous_adjusted = adjusted;

        self.rows.push(LedgerRow {
            bar: bar.clone(),
            action,
            in_trade: self.account.in_trade,
            aux: self.account.aux,
            account_value: self.account.account_value,
            adjusted_account_value: adjusted,
            adjusted_account_value_change: change,
            adjusted_account_value_change_perc: change_perc,
            fee,
            synthetic,
        });
    }
}

/// Advance the account over `bars`, one action per bar.
///
/// When the run ends in a trade and `exit_on_end` is set, a synthetic bar
/// one `interval` after the last real bar (one minute if unknown) closes
/// the position at the last close.
pub fn simulate(
    bars: &[OhlcvBar],
    actions: &[Action],
    config: &BacktestConfig,
    interval: Option<Duration>,
) -> Vec<LedgerRow> {
    let mut run = Run::new(config, bars.len());
    for (bar, &action) in bars.iter().zip(actions) {
        run.step(bar, action, false);
    }

    if config.exit_on_end && run.account.in_trade {
        if let Some(last) = bars.last() {
            let mut closing = last.clone();
            closing.time = last.time + interval.unwrap_or_else(|| Duration::minutes(1));
            if !closing.close.is_finite() {
                closing.close = run.last_price;
            }
            run.step(&closing, Action::Exit, true);
        }
    }
    run.rows
}

/// The `adjusted_account_value` column.
pub fn equity_curve(rows: &[LedgerRow]) -> Vec<f64> {
    rows.iter().map(|r| r.adjusted_account_value).collect()
}
