//! Trade log extraction.
//!
//! Compresses the ledger to one row per position change: the first row of
//! each run of equal `in_trade`, kept only when its adjusted account value
//! moved since the previous kept row.

use chrono::NaiveDateTime;

use crate::domain::action::Action;
use crate::domain::simulator::LedgerRow;

/// Value changes at or below this are treated as no change.
pub const VALUE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeLogEntry {
    pub time: NaiveDateTime,
    pub in_trade: bool,
    pub action: Action,
    pub close: f64,
    pub adjusted_account_value: f64,
    /// Value change since the previous kept row.
    pub change: f64,
    pub change_perc: f64,
    pub fee: f64,
}

impl TradeLogEntry {
    pub fn is_win(&self) -> bool {
        self.change > 0.0
    }
}

/// With a commission the entry fee moves the account value, so the entry
/// row of every round trip is kept as a losing row of its own.
pub fn extract_trade_log(rows: &[LedgerRow], base_balance: f64) -> Vec<TradeLogEntry> {
    let mut log = Vec::new();
    let mut reference = base_balance;
    let mut previous_in_trade: Option<bool> = None;

    for row in rows {
        if previous_in_trade == Some(row.in_trade) {
            continue;
        }
        previous_in_trade = Some(row.in_trade);

        let change = row.adjusted_account_value - reference;
        if change.abs() <= VALUE_EPSILON || change.is_nan() {
            continue;
        }
        let change_perc = if reference != 0.0 {
            change / reference * 100.0
        } else {
            0.0
        };
        log.push(TradeLogEntry {
            time: row.bar.time,
            in_trade: row.in_trade,
            action: row.action,
            close: row.bar.close,
            adjusted_account_value: row.adjusted_account_value,
            change,
            change_perc,
            fee: row.fee,
        });
        reference = row.adjusted_account_value;
    }
    log
}
