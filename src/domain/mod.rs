//! Core domain types and logic.

pub mod bar;
pub mod clause;
pub mod clause_parser;
pub mod clause_eval;
pub mod action;
pub mod strategy;
pub mod transformer;
pub mod config_validation;
pub mod simulator;
pub mod trade_log;
pub mod metrics;
pub mod rule_eval;
pub mod backtest;
pub mod error;
