//! End-to-end engine tests.
//!
//! Tests cover:
//! - The nine-bar reference scenario through clause resolution
//! - Action precedence across the five logic groups
//! - Lookback confirmation, lot sizing and commission
//! - Rule evaluation on a finished summary
//! - Data and configuration errors
//! - Parallel batches through a mock data port

mod common;

use common::*;
use fasttrade::domain::action::Action;
use fasttrade::domain::backtest::{run_backtest, run_batch};
use fasttrade::domain::error::FastTradeError;
use fasttrade::domain::strategy::BacktestConfig;
use fasttrade::domain::transformer::TransformerRegistry;
use serde_json::json;

fn signal_config() -> BacktestConfig {
    BacktestConfig {
        name: "signal".into(),
        enter: vec![clause("signal", "=", 1.0)],
        exit: vec![clause("signal", "=", -1.0)],
        ..BacktestConfig::default()
    }
}

mod reference_scenario {
    use super::*;

    const CLOSES: [f64; 9] = [10.0, 11.0, 12.0, 12.0, 13.0, 10.0, 15.0, 15.0, 14.0];
    // e h x x x e x h h
    const SIGNALS: [f64; 9] = [1.0, 0.0, -1.0, -1.0, -1.0, 1.0, -1.0, 0.0, 0.0];

    #[test]
    fn actions_follow_the_signal() {
        let result = run_backtest(&signal_config(), &signal_series(&CLOSES, &SIGNALS), None).unwrap();
        let symbols: Vec<&str> = result.actions().iter().map(|a| a.symbol()).collect();
        assert_eq!(symbols, vec!["e", "h", "x", "x", "x", "e", "x", "h", "h"]);
    }

    #[test]
    fn two_completed_trade_legs() {
        let result = run_backtest(&signal_config(), &signal_series(&CLOSES, &SIGNALS), None).unwrap();
        assert_eq!(result.trade_log.len(), 2);
        assert_eq!(result.trade_log[0].adjusted_account_value, 1200.0);
        assert_eq!(result.trade_log[1].adjusted_account_value, 1800.0);
        assert!(result.trade_log.iter().all(|t| !t.in_trade && t.is_win()));
    }

    #[test]
    fn equity_is_flat_while_out_of_the_market() {
        let result = run_backtest(&signal_config(), &signal_series(&CLOSES, &SIGNALS), None).unwrap();
        for i in [3, 4, 7, 8] {
            assert_eq!(result.ledger[i].adjusted_account_value_change, 0.0, "bar {i}");
        }
        assert_eq!(result.ledger.len(), 9);
        assert!(result.ledger.iter().all(|r| !r.synthetic));
    }

    #[test]
    fn summary_matches_the_ledger() {
        let result = run_backtest(&signal_config(), &signal_series(&CLOSES, &SIGNALS), None).unwrap();
        let s = &result.summary;
        assert_eq!(s.num_trades, 2);
        assert_eq!(s.total_num_winning_trades, 2);
        assert_eq!(s.total_num_losing_trades, 0);
        assert_eq!(s.win_perc, 100.0);
        assert_eq!(s.equity_final, 1800.0);
        assert_eq!(s.equity_peak, 1800.0);
        assert_eq!(s.return_perc, 80.0);
        assert_eq!(s.buy_and_hold_perc, 40.0);
        assert_eq!(s.total_tics, 9);
        assert_eq!(s.total_missing, 0);
        assert_eq!(s.total_fees, 0.0);
        assert_eq!(s.first_tic, "2024-01-01 00:00:00");
        assert_eq!(s.last_tic, "2024-01-01 00:08:00");
    }
}

mod precedence {
    use super::*;

    #[test]
    fn exit_outranks_enter_on_the_same_bar() {
        let config = BacktestConfig {
            enter: vec![clause("close", ">", 0.0)],
            exit: vec![clause("close", ">", 10.0)],
            exit_on_end: false,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&config, &make_series(&[5.0, 12.0, 8.0]), None).unwrap();
        assert_eq!(result.actions(), vec![Action::Enter, Action::Exit, Action::Enter]);
    }

    #[test]
    fn hard_exit_overrides_everything() {
        let config = BacktestConfig {
            enter: vec![clause("close", ">", 0.0)],
            hard_exit: vec![clause("volume", "<", 0.5), clause("close", "<", 6.0)],
            exit_on_end: false,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&config, &make_series(&[10.0, 5.0, 10.0]), None).unwrap();
        assert_eq!(result.actions(), vec![Action::Enter, Action::Exit, Action::Enter]);
        assert!(!result.ledger[1].in_trade);
    }

    #[test]
    fn soft_groups_are_disjunctions() {
        let config = BacktestConfig {
            any_enter: vec![clause("close", "<", 5.0), clause("close", ">", 100.0)],
            any_exit: vec![clause("close", "=", 50.0), clause("close", "=", 60.0)],
            exit_on_end: false,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&config, &make_series(&[4.0, 20.0, 60.0, 200.0]), None).unwrap();
        assert_eq!(
            result.actions(),
            vec![Action::AnyEnter, Action::Hold, Action::AnyExit, Action::AnyEnter]
        );
    }

    #[test]
    fn enter_requires_every_clause() {
        let series = make_series(&[10.0, 20.0, 30.0])
            .with_column("rsi", vec![20.0, 50.0, 25.0])
            .unwrap();
        let config = BacktestConfig {
            enter: vec![clause("rsi", "<", 30.0), clause("close", ">=", 20.0)],
            exit_on_end: false,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&config, &series, None).unwrap();
        assert_eq!(result.actions(), vec![Action::Hold, Action::Hold, Action::Enter]);
    }
}

mod sizing {
    use super::*;

    #[test]
    fn all_in_entry_converts_the_whole_balance() {
        let series = signal_series(&[10.0, 10.0], &[1.0, 0.0]);
        let result = run_backtest(&signal_config(), &series, None).unwrap();
        assert_eq!(result.ledger[0].account_value, 0.0);
        assert_eq!(result.ledger[0].aux, 100.0);
        assert_eq!(result.ledger[0].adjusted_account_value, 1000.0);
    }

    #[test]
    fn commission_reduces_final_equity() {
        let config = BacktestConfig {
            commission: 1.0,
            ..signal_config()
        };
        let result = run_backtest(&config, &signal_series(&[10.0, 20.0], &[1.0, -1.0]), None).unwrap();
        assert_eq!(result.summary.total_fees, 29.8);
        assert_eq!(result.summary.equity_final, 1960.2);
        assert!(result.ledger.iter().all(|r| r.fee >= 0.0));
    }

    #[test]
    fn capped_lot_leaves_cash_behind() {
        let config = BacktestConfig {
            lot_size_perc: 0.5,
            max_lot_size: 100.0,
            ..signal_config()
        };
        let result = run_backtest(&config, &signal_series(&[10.0, 20.0], &[1.0, -1.0]), None).unwrap();
        assert_eq!(result.ledger[0].account_value, 900.0);
        assert_eq!(result.ledger[0].aux, 10.0);
        assert_eq!(result.summary.equity_final, 1100.0);
    }

    #[test]
    fn lookback_two_needs_two_bars() {
        let config = BacktestConfig {
            enter: vec![clause("close", ">", 100.0).with_lookback(2)],
            exit_on_end: false,
            ..BacktestConfig::default()
        };
        let blip = run_backtest(&config, &make_series(&[90.0, 110.0, 90.0]), None).unwrap();
        assert!(blip.actions().iter().all(|a| *a == Action::Hold));

        let held = run_backtest(&config, &make_series(&[90.0, 110.0, 120.0]), None).unwrap();
        assert_eq!(held.actions()[2], Action::Enter);
    }
}

mod rules {
    use super::*;

    #[test]
    fn failing_rule_reports_false_everywhere() {
        let rules = vec![json!(["sharpe_ratio", ">", 1000])];
        let result = run_backtest(
            &signal_config(),
            &signal_series(&[10.0, 12.0], &[1.0, -1.0]),
            Some(&rules),
        )
        .unwrap();
        let outcome = result.rules.unwrap();
        assert!(!outcome.all_pass);
        assert!(!outcome.any_pass);
        assert_eq!(outcome.results, vec![false]);
    }

    #[test]
    fn nested_keys_and_key_comparisons() {
        let rules = vec![
            json!(["return_perc", ">=", "buy_and_hold_perc"]),
            json!(["trade_streaks.longest_win_streak", "=", 1]),
            json!(["commission_impact.total_fees", "=", 0]),
        ];
        let result = run_backtest(
            &signal_config(),
            &signal_series(&[10.0, 12.0, 12.0], &[1.0, -1.0, 0.0]),
            Some(&rules),
        )
        .unwrap();
        let outcome = result.rules.unwrap();
        assert_eq!(outcome.results, vec![true, true, true]);
        assert!(outcome.all_pass);
    }

    #[test]
    fn empty_rule_list_is_not_success() {
        let result = run_backtest(&signal_config(), &signal_series(&[10.0], &[0.0]), Some(&[])).unwrap();
        let outcome = result.rules.unwrap();
        assert!(!outcome.all_pass && !outcome.any_pass && outcome.results.is_empty());
    }
}

mod errors {
    use super::*;
    use fasttrade::adapters::csv_adapter::read_csv;
    use fasttrade::domain::bar::BarSeries;

    #[test]
    fn empty_series_never_yields_a_summary() {
        let err = run_backtest(&signal_config(), &BarSeries::default(), None).unwrap_err();
        assert!(matches!(err, FastTradeError::EmptySeries));
        assert!(err.is_data_error());
    }

    #[test]
    fn missing_indicator_column() {
        let err = run_backtest(&signal_config(), &make_series(&[1.0, 2.0]), None).unwrap_err();
        assert!(matches!(err, FastTradeError::MissingColumn { column } if column == "signal"));
    }

    #[test]
    fn missing_column_does_not_hide_other_problems() {
        let config = BacktestConfig {
            lot_size_perc: 5.0,
            commission: -1.0,
            ..signal_config()
        };
        let err = run_backtest(&config, &make_series(&[1.0, 2.0]), None).unwrap_err();
        let FastTradeError::Validation(report) = err else {
            panic!("expected a validation report, got {err:?}");
        };
        assert!(report.contains("lot_size_perc"));
        assert!(report.contains("commission"));
        assert!(report.iter().any(|(_, problem)| problem.contains("'signal'")));
    }

    #[test]
    fn mixed_case_indicator_header_is_usable() {
        let csv = "\
Date,Open,High,Low,Close,Volume,RSI_14
2024-01-01 00:00:00,10,10,10,10,1,45
2024-01-01 00:01:00,11,11,11,11,1,25
2024-01-01 00:02:00,12,12,12,12,1,55
";
        let series = read_csv(csv.as_bytes()).unwrap();
        let config = BacktestConfig {
            enter: vec![clause("RSI_14", "<", 30.0)],
            exit: vec![clause("RSI_14", ">", 50.0)],
            exit_on_end: false,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&config, &series, None).unwrap();
        assert_eq!(result.actions(), vec![Action::Hold, Action::Enter, Action::Exit]);
    }

    #[test]
    fn every_configuration_problem_is_reported() {
        let mut config = BacktestConfig {
            lot_size_perc: 0.0,
            commission: -1.0,
            base_balance: 0.0,
            ..signal_config()
        };
        config.exit.push(clause("close", "=>", 1.0));
        config.any_exit.push(clause("close", "<", 1.0).with_lookback(-1));

        let err = run_backtest(&config, &signal_series(&[1.0], &[0.0]), None).unwrap_err();
        let FastTradeError::Validation(report) = err else {
            panic!("expected a validation report");
        };
        for field in ["lot_size_perc", "commission", "base_balance", "exit[1]", "any_exit[0]"] {
            assert!(report.contains(field), "missing {field} in {report}");
        }
        assert_eq!(report.len(), 5);
    }

    #[test]
    fn strategy_without_entries_is_rejected() {
        let config = BacktestConfig {
            exit: vec![clause("close", ">", 1.0)],
            ..BacktestConfig::default()
        };
        let err = run_backtest(&config, &make_series(&[1.0]), None).unwrap_err();
        assert!(matches!(err, FastTradeError::Validation(r) if r.contains("enter")));
    }
}

mod determinism {
    use super::*;

    #[test]
    fn identical_inputs_give_identical_output() {
        let config = BacktestConfig {
            commission: 0.25,
            lot_size_perc: 0.7,
            ..signal_config()
        };
        let series = signal_series(
            &[10.0, 10.5, 11.2, 9.8, 10.1, 12.4, 11.9],
            &[1.0, 0.0, -1.0, 1.0, 0.0, 0.0, -1.0],
        );
        let a = run_backtest(&config, &series, None).unwrap();
        let b = run_backtest(&config, &series, None).unwrap();
        assert_eq!(
            serde_json::to_string(&a.summary).unwrap(),
            serde_json::to_string(&b.summary).unwrap()
        );
        assert_eq!(a.trade_log, b.trade_log);
    }
}

mod batch {
    use super::*;

    #[test]
    fn results_come_back_in_input_order() {
        let port = MockDataPort::new()
            .with_series("AAA", signal_series(&[10.0, 12.0], &[1.0, -1.0]))
            .with_series("CCC", signal_series(&[10.0, 8.0], &[1.0, -1.0]))
            .with_series("EMPTY", Default::default())
            .with_error("BBB", "archive unavailable");
        let symbols: Vec<String> = ["AAA", "BBB", "CCC", "EMPTY"].iter().map(|s| s.to_string()).collect();

        let results = run_batch(&signal_config(), &symbols, &port, &TransformerRegistry::new(), None);

        let names: Vec<&str> = results.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["AAA", "BBB", "CCC", "EMPTY"]);
        assert_eq!(results[0].1.as_ref().unwrap().summary.equity_final, 1200.0);
        assert!(matches!(&results[1].1, Err(FastTradeError::Data { reason }) if reason == "archive unavailable"));
        assert_eq!(results[2].1.as_ref().unwrap().summary.equity_final, 800.0);
        assert!(matches!(results[3].1, Err(FastTradeError::EmptySeries)));
    }

    #[test]
    fn batch_matches_single_runs() {
        let series = signal_series(&[10.0, 11.0, 9.0, 13.0], &[1.0, -1.0, 1.0, -1.0]);
        let port = MockDataPort::new().with_series("X", series.clone());
        let single = run_backtest(&signal_config(), &series, None).unwrap();
        let batch = run_batch(
            &signal_config(),
            &["X".to_string()],
            &port,
            &TransformerRegistry::new(),
            None,
        );
        let batched = batch[0].1.as_ref().unwrap();
        assert_eq!(batched.summary, single.summary);
        assert_eq!(batched.ledger, single.ledger);
    }
}
