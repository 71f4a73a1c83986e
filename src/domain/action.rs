//! Per-bar action resolution.
//!
//! The resolver holds an ordered trigger table; the first trigger that
//! fires decides the bar's action:
//!
//! 1. `hard_exit` (any clause) -> [`Action::Exit`]
//! 2. trailing stop (`close <= trailing_stop_loss`) -> [`Action::TrailingStop`]
//! 3. `exit` (all clauses) -> [`Action::Exit`]
//! 4. `any_exit` (any clause) -> [`Action::AnyExit`]
//! 5. `enter` (all clauses) -> [`Action::Enter`]
//! 6. `any_enter` (any clause) -> [`Action::AnyEnter`]
//! 7. otherwise [`Action::Hold`]

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::bar::OhlcvBar;
use crate::domain::clause::Clause;
use crate::domain::clause_eval::{BarWindow, all_hold, any_holds};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "h")]
    Hold,
    #[serde(rename = "e")]
    Enter,
    #[serde(rename = "x")]
    Exit,
    #[serde(rename = "ae")]
    AnyEnter,
    #[serde(rename = "ax")]
    AnyExit,
    #[serde(rename = "tsl")]
    TrailingStop,
}

impl Action {
    pub fn symbol(self) -> &'static str {
        match self {
            Action::Hold => "h",
            Action::Enter => "e",
            Action::Exit => "x",
            Action::AnyEnter => "ae",
            Action::AnyExit => "ax",
            Action::TrailingStop => "tsl",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "h" => Some(Action::Hold),
            "e" => Some(Action::Enter),
            "x" => Some(Action::Exit),
            "ae" => Some(Action::AnyEnter),
            "ax" => Some(Action::AnyExit),
            "tsl" => Some(Action::TrailingStop),
            _ => None,
        }
    }

    pub fn is_entry(self) -> bool {
        matches!(self, Action::Enter | Action::AnyEnter)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, Action::Exit | Action::AnyExit | Action::TrailingStop)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone)]
enum Trigger {
    All(Vec<Clause>),
    Any(Vec<Clause>),
    TrailingStop(usize),
}

impl Trigger {
    fn fires(&self, window: &BarWindow<'_>) -> bool {
        match self {
            Trigger::All(clauses) => all_hold(clauses, window),
            Trigger::Any(clauses) => any_holds(clauses, window),
            Trigger::TrailingStop(column) => window.current().is_some_and(|bar| {
                let stop = bar.column(*column);
                !stop.is_nan() && !bar.close.is_nan() && bar.close <= stop
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionResolver {
    table: Vec<(Trigger, Action)>,
    window: usize,
}

impl ActionResolver {
    pub fn new(strategy: &Strategy) -> Self {
        let mut table = vec![(Trigger::Any(strategy.hard_exit.clone()), Action::Exit)];
        if let Some(column) = strategy.trailing_stop_column {
            table.push((Trigger::TrailingStop(column), Action::TrailingStop));
        }
        table.extend([
            (Trigger::All(strategy.exit.clone()), Action::Exit),
            (Trigger::Any(strategy.any_exit.clone()), Action::AnyExit),
            (Trigger::All(strategy.enter.clone()), Action::Enter),
            (Trigger::Any(strategy.any_enter.clone()), Action::AnyEnter),
        ]);
        Self {
            table,
            window: strategy.max_lookback.max(1),
        }
    }

    /// Resolve the action for the newest bar in `window`.
    pub fn resolve(&self, window: &BarWindow<'_>) -> Action {
        self.table
            .iter()
            .find(|(trigger, _)| trigger.fires(window))
            .map(|(_, action)| *action)
            .unwrap_or(Action::Hold)
    }

    /// Resolve every bar in time order. Each resolution sees only the
    /// current bar and the ones before it.
    pub fn resolve_all(&self, bars: &[OhlcvBar]) -> Vec<Action> {
        let mut window = BarWindow::new(self.window.min(bars.len()));
        bars.iter()
            .map(|bar| {
                window.push(bar);
                let action = self.resolve(&window);
                if action != Action::Hold {
                    trace!(time = %bar.time, action = %action, "resolved");
                }
                action
            })
            .collect()
    }
}
