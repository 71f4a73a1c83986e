//! Acceptance rules over a finished summary.
//!
//! A rule is `[key, operator, value_or_key]`. `key` may be dotted to reach
//! nested groups (`trade_streaks.avg_win_streak`). The right-hand side is a
//! number, a numeric string, or another summary key.
//!
//! Malformed rules are logged and skipped; they never fail a run.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::domain::clause::{Operator, parse_literal};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub all_pass: bool,
    pub any_pass: bool,
    /// One entry per well-formed rule, in input order.
    pub results: Vec<bool>,
}

/// Follow a dotted path through nested JSON objects.
pub fn lookup<'a>(summary: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(summary, |node, part| node.as_object()?.get(part))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_literal(s),
        _ => None,
    }
}

fn evaluate_rule(summary: &Value, rule: &Value) -> Result<bool, String> {
    let parts = rule
        .as_array()
        .filter(|parts| parts.len() == 3)
        .ok_or_else(|| "rule must be a [key, operator, value] array".to_string())?;

    let key = parts[0]
        .as_str()
        .ok_or_else(|| "rule key must be a string".to_string())?;
    let left = lookup(summary, key)
        .ok_or_else(|| format!("unknown summary key '{key}'"))
        .and_then(|v| as_number(v).ok_or_else(|| format!("summary key '{key}' is not numeric")))?;

    let symbol = parts[1]
        .as_str()
        .ok_or_else(|| "rule operator must be a string".to_string())?;
    let operator = Operator::parse(symbol).ok_or_else(|| format!("unknown operator '{symbol}'"))?;

    let right = match &parts[2] {
        Value::String(s) => match parse_literal(s) {
            Some(v) => v,
            None => lookup(summary, s)
                .and_then(as_number)
                .ok_or_else(|| format!("'{s}' is neither a number nor a numeric summary key"))?,
        },
        other => as_number(other).ok_or_else(|| format!("rule value {other} is not numeric"))?,
    };

    Ok(operator.compare(left, right))
}

/// Evaluate every rule against `summary`.
///
/// No rules, or no well-formed ones, yields `(false, false, [])`.
pub fn evaluate_rules(summary: &Value, rules: &[Value]) -> RuleOutcome {
    let results: Vec<bool> = rules
        .iter()
        .filter_map(|rule| match evaluate_rule(summary, rule) {
            Ok(result) => Some(result),
            Err(reason) => {
                warn!(rule = %rule, %reason, "skipping malformed rule");
                None
            }
        })
        .collect();

    if results.is_empty() {
        return RuleOutcome::default();
    }
    RuleOutcome {
        all_pass: results.iter().all(|r| *r),
        any_pass: results.iter().any(|r| *r),
        results,
    }
}
