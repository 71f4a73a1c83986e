//! Backtest configuration and the compiled strategy the engine runs.

use serde::{Deserialize, Serialize};

use crate::domain::clause::{Clause, ClauseSpec};
use crate::domain::transformer::IndicatorSpec;

/// Per-run configuration. Deserializes from JSON with clauses as
/// `[left, op, right, lookback?]` arrays; omitted keys take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub name: String,
    pub base_balance: f64,
    /// Percentage charged on each conversion (0.1 = 0.1%).
    pub commission: f64,
    pub lot_size_perc: f64,
    /// Cap on a single entry in base currency; 0 means unbounded.
    pub max_lot_size: f64,
    pub exit_on_end: bool,
    pub trailing_stop_loss: f64,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub indicators: Vec<IndicatorSpec>,
    pub enter: Vec<ClauseSpec>,
    pub exit: Vec<ClauseSpec>,
    pub any_enter: Vec<ClauseSpec>,
    pub any_exit: Vec<ClauseSpec>,
    pub hard_exit: Vec<ClauseSpec>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_balance: 1000.0,
            commission: 0.0,
            lot_size_perc: 1.0,
            max_lot_size: 0.0,
            exit_on_end: true,
            trailing_stop_loss: 0.0,
            start: None,
            stop: None,
            indicators: Vec::new(),
            enter: Vec::new(),
            exit: Vec::new(),
            any_enter: Vec::new(),
            any_exit: Vec::new(),
            hard_exit: Vec::new(),
        }
    }
}

impl BacktestConfig {
    pub fn group(&self, group: LogicGroup) -> &[ClauseSpec] {
        match group {
            LogicGroup::Enter => &self.enter,
            LogicGroup::Exit => &self.exit,
            LogicGroup::AnyEnter => &self.any_enter,
            LogicGroup::AnyExit => &self.any_exit,
            LogicGroup::HardExit => &self.hard_exit,
        }
    }

    pub fn group_mut(&mut self, group: LogicGroup) -> &mut Vec<ClauseSpec> {
        match group {
            LogicGroup::Enter => &mut self.enter,
            LogicGroup::Exit => &mut self.exit,
            LogicGroup::AnyEnter => &mut self.any_enter,
            LogicGroup::AnyExit => &mut self.any_exit,
            LogicGroup::HardExit => &mut self.hard_exit,
        }
    }

    /// Every field name referenced by any clause, first occurrence order.
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for group in LogicGroup::ALL {
            for clause in self.group(group) {
                for field in clause.fields() {
                    if !fields.iter().any(|f| f == field) {
                        fields.push(field.to_string());
                    }
                }
            }
        }
        fields
    }

    pub fn uses_trailing_stop(&self) -> bool {
        self.trailing_stop_loss > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicGroup {
    Enter,
    Exit,
    AnyEnter,
    AnyExit,
    HardExit,
}

impl LogicGroup {
    pub const ALL: [LogicGroup; 5] = [
        LogicGroup::Enter,
        LogicGroup::Exit,
        LogicGroup::AnyEnter,
        LogicGroup::AnyExit,
        LogicGroup::HardExit,
    ];

    /// Configuration key of the group.
    pub fn key(self) -> &'static str {
        match self {
            LogicGroup::Enter => "enter",
            LogicGroup::Exit => "exit",
            LogicGroup::AnyEnter => "any_enter",
            LogicGroup::AnyExit => "any_exit",
            LogicGroup::HardExit => "hard_exit",
        }
    }
}

/// Clauses resolved against a concrete column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Strategy {
    pub enter: Vec<Clause>,
    pub exit: Vec<Clause>,
    pub any_enter: Vec<Clause>,
    pub any_exit: Vec<Clause>,
    pub hard_exit: Vec<Clause>,
    /// Position of the trailing stop column, when a stop is configured.
    pub trailing_stop_column: Option<usize>,
    /// Longest lookback across all groups.
    pub max_lookback: usize,
}

impl Strategy {
    pub fn group_mut(&mut self, group: LogicGroup) -> &mut Vec<Clause> {
        match group {
            LogicGroup::Enter => &mut self.enter,
            LogicGroup::Exit => &mut self.exit,
            LogicGroup::AnyEnter => &mut self.any_enter,
            LogicGroup::AnyExit => &mut self.any_exit,
            LogicGroup::HardExit => &mut self.hard_exit,
        }
    }

    pub fn clause_count(&self) -> usize {
        self.enter.len()
            + self.exit.len()
            + self.any_enter.len()
            + self.any_exit.len()
            + self.hard_exit.len()
    }
}
