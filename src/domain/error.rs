//! Domain error types.

use std::collections::BTreeMap;
use std::fmt;

/// A parse error with position information for textual clause groups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Every configuration problem found in one validation pass, keyed by the
/// offending configuration field (`lot_size_perc`, `enter[1]`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    problems: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, problem: impl Into<String>) {
        self.problems
            .entry(field.into())
            .or_default()
            .push(problem.into());
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Total number of problems across all fields.
    pub fn len(&self) -> usize {
        self.problems.values().map(Vec::len).sum()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.problems.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.problems.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.problems.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.problems
            .iter()
            .flat_map(|(field, list)| list.iter().map(move |p| (field.as_str(), p.as_str())))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} configuration problem(s)", self.len())?;
        for (field, problem) in self.iter() {
            write!(f, "\n  {field}: {problem}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Top-level error type for fasttrade.
#[derive(Debug, thiserror::Error)]
pub enum FastTradeError {
    #[error("invalid configuration: {0}")]
    Validation(ValidationReport),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error(transparent)]
    ClauseParse(#[from] ParseError),

    #[error("bar series is empty")]
    EmptySeries,

    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    #[error("field '{field}' is neither a literal nor a known column")]
    FieldNotFound { field: String },

    #[error("time index is not strictly increasing at row {position} ({time})")]
    NonMonotonicIndex { position: usize, time: String },

    #[error("unknown transformer '{name}'")]
    UnknownTransformer { name: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FastTradeError {
    /// Data errors abort a run; everything else is a configuration or I/O problem.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            FastTradeError::EmptySeries
                | FastTradeError::MissingColumn { .. }
                | FastTradeError::FieldNotFound { .. }
                | FastTradeError::NonMonotonicIndex { .. }
                | FastTradeError::Data { .. }
        )
    }
}

impl From<ValidationReport> for FastTradeError {
    fn from(report: ValidationReport) -> Self {
        FastTradeError::Validation(report)
    }
}

impl From<&FastTradeError> for std::process::ExitCode {
    fn from(err: &FastTradeError) -> Self {
        let code: u8 = match err {
            FastTradeError::Io(_) => 1,
            FastTradeError::Validation(_)
            | FastTradeError::ConfigParse { .. }
            | FastTradeError::UnknownTransformer { .. }
            | FastTradeError::Json(_) => 2,
            FastTradeError::EmptySeries
            | FastTradeError::MissingColumn { .. }
            | FastTradeError::FieldNotFound { .. }
            | FastTradeError::NonMonotonicIndex { .. }
            | FastTradeError::Data { .. } => 3,
            FastTradeError::ClauseParse(_) => 4,
        };
        std::process::ExitCode::from(code)
    }
}
