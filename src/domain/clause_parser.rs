//! Textual clause parser.
//!
//! Parses the compact form used in INI strategy files:
//!
//! ```text
//! close > sma_20; rsi_14 < 30 [2]; is_up = true
//! ```
//!
//! Each clause is `left OP right` with an optional `[lookback]` suffix.
//! Errors carry the character offset into the full input.

use crate::domain::clause::{ClauseSpec, Term};
use crate::domain::error::ParseError;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.input.len()
    }

    fn found(&self) -> String {
        self.peek()
            .map(|c| format!("'{c}'"))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(ParseError {
                message: format!("expected '{}', found {}", expected, self.found()),
                position: self.pos,
            }),
        }
    }

    fn is_word_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_' || ch == '.'
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut digits = 0;

        if matches!(self.peek(), Some('-' | '+')) {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' || ch == 'e' || ch == 'E' {
                self.advance();
                if matches!(ch, 'e' | 'E') && matches!(self.peek(), Some('-' | '+')) {
                    self.advance();
                }
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {num_str}"),
            position: start,
        })
    }

    fn parse_integer(&mut self) -> Result<i64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;

        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<i64>().map_err(|_| ParseError {
            message: "expected integer".to_string(),
            position: start,
        })
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => {
                Ok(Term::Number(self.parse_number()?))
            }
            Some(ch) if Self::is_word_char(ch) => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if Self::is_word_char(c)) {
                    self.advance();
                }
                let word = &self.input[start..self.pos];
                Ok(match word {
                    "true" => Term::Bool(true),
                    "false" => Term::Bool(false),
                    _ => Term::Text(word.to_string()),
                })
            }
            _ => Err(ParseError {
                message: format!("expected field name or number, found {}", self.found()),
                position: self.pos,
            }),
        }
    }

    fn parse_operator(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        for symbol in [">=", "<=", "!=", ">", "<", "="] {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return Ok(symbol.to_string());
            }
        }
        Err(ParseError {
            message: format!(
                "expected operator (>, <, =, !=, >=, <=), found {}",
                self.found()
            ),
            position: self.pos,
        })
    }

    fn parse_clause(&mut self) -> Result<ClauseSpec, ParseError> {
        let left = self.parse_term()?;
        let operator = self.parse_operator()?;
        let right = self.parse_term()?;

        let mut clause = ClauseSpec::new(left, &operator, right);

        self.skip_whitespace();
        if self.peek() == Some('[') {
            self.advance();
            let lookback = self.parse_integer()?;
            self.expect_char(']')?;
            clause = clause.with_lookback(lookback);
        }
        Ok(clause)
    }

    fn parse_list(&mut self) -> Result<Vec<ClauseSpec>, ParseError> {
        let mut clauses = Vec::new();
        loop {
            if self.at_end() {
                break;
            }
            if self.peek() == Some(';') {
                self.advance();
                continue;
            }
            clauses.push(self.parse_clause()?);
            if self.at_end() {
                break;
            }
            if self.peek() != Some(';') {
                return Err(ParseError {
                    message: format!("expected ';' between clauses, found {}", self.found()),
                    position: self.pos,
                });
            }
        }
        Ok(clauses)
    }
}

/// Parse a single clause such as `rsi_14 < 30 [2]`.
pub fn parse_clause(input: &str) -> Result<ClauseSpec, ParseError> {
    let mut parser = Parser::new(input);
    if parser.at_end() {
        return Err(ParseError {
            message: "empty clause".to_string(),
            position: 0,
        });
    }
    let clause = parser.parse_clause()?;
    if !parser.at_end() {
        return Err(ParseError {
            message: format!("unexpected input after clause: '{}'", parser.remaining()),
            position: parser.pos,
        });
    }
    Ok(clause)
}

/// Parse a `;`-separated clause group. Empty input is an empty group.
pub fn parse_clause_list(input: &str) -> Result<Vec<ClauseSpec>, ParseError> {
    Parser::new(input).parse_list()
}
