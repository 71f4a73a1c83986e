//! Clause data structures.
//!
//! - `ClauseSpec`: the configured `[left, operator, right, lookback?]` form
//! - `Term`: one side of a configured clause, before resolution
//! - `Operand`: a side resolved against the series columns
//! - `Clause`: a resolved clause ready for per-bar evaluation

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::bar::OhlcvBar;
use crate::domain::error::FastTradeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Gt,
        Operator::Lt,
        Operator::Eq,
        Operator::Ne,
        Operator::Ge,
        Operator::Le,
    ];

    pub fn parse(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol.trim())
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
        }
    }

    /// IEEE-754 comparison; any comparison involving NaN is false.
    pub fn compare(self, left: f64, right: f64) -> bool {
        if left.is_nan() || right.is_nan() {
            return false;
        }
        match self {
            Operator::Gt => left > right,
            Operator::Lt => left < right,
            Operator::Eq => left == right,
            Operator::Ne => left != right,
            Operator::Ge => left >= right,
            Operator::Le => left <= right,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Term {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Term {
    /// The column this term references, if it is not a literal.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Term::Text(s) if parse_literal(s).is_none() && parse_bool(s).is_none() => {
                Some(s.trim())
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Bool(b) => write!(f, "{b}"),
            Term::Number(n) => write!(f, "{n}"),
            Term::Text(s) => f.write_str(s),
        }
    }
}

/// Numeric literal in string form. Words such as `inf` or `nan` are
/// column names, not literals.
pub fn parse_literal(text: &str) -> Option<f64> {
    let text = text.trim();
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "True" => Some(true),
        "false" | "False" => Some(false),
        _ => None,
    }
}

/// A clause as configured: `[left, operator, right, lookback?]`.
///
/// The operator and lookback stay unchecked here so that validation can
/// report every problem at once.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClauseSpec {
    pub left: Term,
    pub operator: String,
    pub right: Term,
    #[serde(default)]
    pub lookback: Option<i64>,
}

impl ClauseSpec {
    pub fn new(left: Term, operator: &str, right: Term) -> Self {
        Self {
            left,
            operator: operator.to_string(),
            right,
            lookback: None,
        }
    }

    pub fn with_lookback(mut self, lookback: i64) -> Self {
        self.lookback = Some(lookback);
        self
    }

    /// Column names referenced by either side.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.left.field_name().into_iter().chain(self.right.field_name())
    }
}

impl Serialize for ClauseSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.lookback.is_some() { 4 } else { 3 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.left)?;
        seq.serialize_element(&self.operator)?;
        seq.serialize_element(&self.right)?;
        if let Some(lookback) = self.lookback {
            seq.serialize_element(&lookback)?;
        }
        seq.end()
    }
}

impl std::fmt::Display for ClauseSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)?;
        if let Some(lookback) = self.lookback {
            write!(f, " [{lookback}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Column(usize),
    Constant(f64),
    Bool(bool),
}

impl Operand {
    /// Resolve a configured term once, against the series' indicator columns.
    pub fn resolve(term: &Term, columns: &[String]) -> Result<Operand, FastTradeError> {
        match term {
            Term::Bool(b) => Ok(Operand::Bool(*b)),
            Term::Number(n) => Ok(Operand::Constant(*n)),
            Term::Text(text) => {
                if let Some(value) = parse_literal(text) {
                    return Ok(Operand::Constant(value));
                }
                if let Some(b) = parse_bool(text) {
                    return Ok(Operand::Bool(b));
                }
                let name = text.trim();
                match name {
                    "open" => Ok(Operand::Open),
                    "high" => Ok(Operand::High),
                    "low" => Ok(Operand::Low),
                    "close" => Ok(Operand::Close),
                    "volume" => Ok(Operand::Volume),
                    _ => columns
                        .iter()
                        .position(|c| c == name)
                        .map(Operand::Column)
                        .ok_or_else(|| FastTradeError::FieldNotFound {
                            field: name.to_string(),
                        }),
                }
            }
        }
    }

    pub fn value(&self, bar: &OhlcvBar) -> f64 {
        match self {
            Operand::Open => bar.open,
            Operand::High => bar.high,
            Operand::Low => bar.low,
            Operand::Close => bar.close,
            Operand::Volume => bar.volume,
            Operand::Column(index) => bar.column(*index),
            Operand::Constant(v) => *v,
            Operand::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub left: Operand,
    pub operator: Operator,
    pub right: Operand,
    /// Number of trailing bars (current included) the comparison must hold on.
    pub lookback: usize,
}

impl Clause {
    pub fn new(left: Operand, operator: Operator, right: Operand) -> Self {
        Self {
            left,
            operator,
            right,
            lookback: 0,
        }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Bars of history needed to confirm this clause.
    pub fn window(&self) -> usize {
        self.lookback.max(1)
    }
}
