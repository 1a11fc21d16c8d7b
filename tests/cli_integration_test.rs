//! CLI integration tests.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, resolve_prices_path)
//! - Tree construction from price columns
//! - The backtest pipeline over a mock price port
//! - End-to-end runs with real INI and CSV files on disk

mod common;

use common::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use treetrader::adapters::file_config_adapter::FileConfigAdapter;
use treetrader::cli;
use treetrader::domain::error::TreetraderError;

fn write_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    path
}

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

const PRICES_CSV: &str = "date,AAA,BBB,CCC
2024-01-01,10.0,20.0,
2024-01-02,11.0,19.0,5.0
2024-01-03,12.0,21.0,5.5
2024-01-04,12.5,21.5,
2024-01-05,13.0,22.0,6.0
";

const VALID_INI: &str = r#"
[data]
prices = prices.csv

[backtest]
initial_capital = 10000
integer_positions = true
commission_per_trade = 1.0
commission_pct = 0.1
start_date = 2024-01-01
end_date = 2024-01-04
"#;

mod config_loading {
    use super::*;

    #[test]
    fn build_backtest_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert!((config.initial_capital - 10_000.0).abs() < f64::EPSILON);
        assert!(config.integer_positions);
        assert!((config.commission_per_trade - 1.0).abs() < f64::EPSILON);
        assert!((config.commission_pct - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.start_date, Some(date(2024, 1, 1)));
        assert_eq!(config.end_date, Some(date(2024, 1, 4)));
    }

    #[test]
    fn build_backtest_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();

        assert!((config.initial_capital - 1_000_000.0).abs() < f64::EPSILON);
        assert!(config.integer_positions);
        assert!((config.commission_per_trade - 0.0).abs() < f64::EPSILON);
        assert!((config.commission_pct - 0.0).abs() < f64::EPSILON);
        assert_eq!(config.start_date, None);
        assert_eq!(config.end_date, None);
    }

    #[test]
    fn build_backtest_config_fractional_positions() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninteger_positions = no\n").unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        assert!(!config.integer_positions);
    }

    #[test]
    fn build_backtest_config_invalid_date_format() {
        let ini = "[backtest]\nstart_date = 01/01/2020\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn build_backtest_config_rejects_non_numeric_capital() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = lots\n").unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(
            matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn prices_path_relative_to_config() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let path = cli::resolve_prices_path(Path::new("/srv/runs/config.ini"), &adapter).unwrap();
        assert_eq!(path, PathBuf::from("/srv/runs/prices.csv"));
    }

    #[test]
    fn prices_path_absolute_kept() {
        let adapter =
            FileConfigAdapter::from_string("[data]\nprices = /data/prices.csv\n").unwrap();
        let path = cli::resolve_prices_path(Path::new("/srv/runs/config.ini"), &adapter).unwrap();
        assert_eq!(path, PathBuf::from("/data/prices.csv"));
    }

    #[test]
    fn prices_path_missing() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        let err = cli::resolve_prices_path(Path::new("config.ini"), &adapter).unwrap_err();
        assert!(matches!(err, TreetraderError::ConfigMissing { key, .. } if key == "prices"));
    }

    #[test]
    fn load_config_missing_file_is_parse_error() {
        let code = cli::load_config(Path::new("/nonexistent/config.ini")).err().unwrap();
        assert!(same_code(code, ExitCode::from(2)));
    }
}

mod tree_building {
    use super::*;

    #[test]
    fn one_security_per_column() {
        let columns = vec!["AAA".to_string(), "BBB".to_string()];
        let tree = cli::build_tree(&columns, &sample_config()).unwrap();
        let root = tree.root();
        assert_eq!(tree.children(root).len(), 2);
        assert!(tree.child(root, "AAA").is_some());
        assert!(tree.child(root, "BBB").is_some());
    }

    #[test]
    fn duplicate_columns_rejected() {
        let columns = vec!["AAA".to_string(), "AAA".to_string()];
        let err = cli::build_tree(&columns, &sample_config()).unwrap_err();
        assert!(matches!(err, TreetraderError::Tree(_)));
    }
}

mod pipeline_mock {
    use super::*;

    #[test]
    fn pipeline_buys_and_holds() {
        let universe = make_universe(&[
            ("AAA", vec![10.0, 11.0, 12.0]),
            ("BBB", vec![20.0, 20.0, 25.0]),
        ]);
        let port = MockPricePort::new(universe);

        let result = cli::execute_backtest(&port, &sample_config()).unwrap();

        // 500 AAA and 250 BBB
        assert_eq!(result.values.len(), 3);
        assert_eq!(result.final_value(), Some(500.0 * 12.0 + 250.0 * 25.0));
        assert_eq!(result.trades, 2);
        let total = result.total_return().unwrap();
        assert!((total - 0.225).abs() < 1e-9);
    }

    #[test]
    fn pipeline_waits_for_first_prices() {
        let universe = make_universe(&[
            ("AAA", vec![f64::NAN, 10.0, 10.0]),
            ("BBB", vec![f64::NAN, 20.0, 20.0]),
        ]);
        let port = MockPricePort::new(universe);

        let result = cli::execute_backtest(&port, &sample_config()).unwrap();

        assert_eq!(result.trades, 2);
        assert_eq!(result.final_value(), Some(10_000.0));
    }

    #[test]
    fn pipeline_respects_date_range() {
        let universe = make_universe(&[("AAA", vec![10.0, 11.0, 12.0, 13.0])]);
        let port = MockPricePort::new(universe);
        let config = treetrader::domain::backtest::BacktestConfig {
            start_date: Some(date(2024, 1, 2)),
            end_date: Some(date(2024, 1, 3)),
            ..sample_config()
        };

        let result = cli::execute_backtest(&port, &config).unwrap();

        assert_eq!(result.values.len(), 2);
        assert_eq!(result.values[0].date, date(2024, 1, 2));
    }

    #[test]
    fn pipeline_empty_range_is_data_error() {
        let universe = make_universe(&[("AAA", vec![10.0])]);
        let port = MockPricePort::new(universe);
        let config = treetrader::domain::backtest::BacktestConfig {
            start_date: Some(date(2025, 1, 1)),
            ..sample_config()
        };

        let err = cli::execute_backtest(&port, &config).unwrap_err();
        assert!(matches!(err, TreetraderError::Data { .. }));
    }

    #[test]
    fn pipeline_port_error_sets_exit_code() {
        let port = MockPricePort::failing("connection refused");
        let code = cli::run_backtest_pipeline(&port, &sample_config());
        assert!(same_code(code, ExitCode::from(3)));
    }
}

mod end_to_end {
    use super::*;

    #[test]
    fn run_with_real_files_succeeds() {
        let dir = tempfile::TempDir::new().unwrap();
        write_temp_file(dir.path(), "prices.csv", PRICES_CSV);
        let config = write_temp_file(dir.path(), "config.ini", VALID_INI);

        let code = cli::run_backtest(&config);
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn run_with_missing_prices_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = write_temp_file(dir.path(), "config.ini", VALID_INI);

        let code = cli::run_backtest(&config);
        assert!(same_code(code, ExitCode::from(3)));
    }

    #[test]
    fn run_with_invalid_config_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = write_temp_file(
            dir.path(),
            "config.ini",
            "[data]\nprices = prices.csv\n[backtest]\ninitial_capital = -1\n",
        );

        let code = cli::run_backtest(&config);
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn run_with_unparsable_commission_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        write_temp_file(dir.path(), "prices.csv", PRICES_CSV);
        let config = write_temp_file(
            dir.path(),
            "config.ini",
            "[data]\nprices = prices.csv\n[backtest]\ninitial_capital = 100\ncommission_pct = ten\n",
        );

        let code = cli::run_backtest(&config);
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn validate_accepts_valid_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = write_temp_file(dir.path(), "config.ini", VALID_INI);
        assert!(same_code(cli::run_validate(&config), ExitCode::SUCCESS));
    }

    #[test]
    fn validate_rejects_bad_dates() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = write_temp_file(
            dir.path(),
            "config.ini",
            "[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\nstart_date = 2024-02-01\nend_date = 2024-01-01\n",
        );
        assert!(same_code(cli::run_validate(&config), ExitCode::from(2)));
    }

    #[test]
    fn info_reads_price_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let prices = write_temp_file(dir.path(), "prices.csv", PRICES_CSV);
        assert!(same_code(cli::run_info(&prices), ExitCode::SUCCESS));
    }

    #[test]
    fn info_missing_file_fails() {
        let code = cli::run_info(Path::new("/nonexistent/prices.csv"));
        assert!(same_code(code, ExitCode::from(3)));
    }
}
