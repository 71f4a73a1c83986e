//! Clause evaluation against a causal window of bars.
//!
//! # Evaluation Semantics
//!
//! - A clause without lookback compares the current bar only
//! - A clause with `lookback = N` must hold on each of the last N bars,
//!   current bar included; with fewer than N bars seen it is false
//! - Conjunctive groups (`enter`, `exit`) are never satisfied when empty
//! - Disjunctive groups (`any_enter`, `any_exit`, `hard_exit`) are plain
//!   disjunctions, so an empty group never fires either

use std::collections::VecDeque;

use crate::domain::bar::OhlcvBar;
use crate::domain::clause::Clause;

/// Bounded ring of the most recent bars, oldest evicted first. Storage
/// grows with the bars pushed, not with the capacity.
#[derive(Debug, Clone)]
pub struct BarWindow<'a> {
    bars: VecDeque<&'a OhlcvBar>,
    capacity: usize,
}

impl<'a> BarWindow<'a> {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, bar: &'a OhlcvBar) {
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The bar being resolved.
    pub fn current(&self) -> Option<&'a OhlcvBar> {
        self.bars.back().copied()
    }

    /// The last `n` bars, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &'a OhlcvBar> + '_ {
        self.bars.iter().rev().take(n).copied()
    }
}

/// Compare the clause on a single bar.
pub fn holds_on(clause: &Clause, bar: &OhlcvBar) -> bool {
    clause
        .operator
        .compare(clause.left.value(bar), clause.right.value(bar))
}

pub fn evaluate(clause: &Clause, window: &BarWindow<'_>) -> bool {
    let needed = clause.window();
    if window.len() < needed {
        return false;
    }
    window.recent(needed).all(|bar| holds_on(clause, bar))
}

/// Conjunction over a group; an empty group is never satisfied.
pub fn all_hold(clauses: &[Clause], window: &BarWindow<'_>) -> bool {
    !clauses.is_empty() && clauses.iter().all(|c| evaluate(c, window))
}

pub fn any_holds(clauses: &[Clause], window: &BarWindow<'_>) -> bool {
    clauses.iter().any(|c| evaluate(c, window))
}
