//! Configuration validation.
//!
//! Validates the `[data]` and `[backtest]` sections before a run starts.

use crate::domain::error::TreetraderError;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TreetraderError> {
    validate_prices_path(config)?;
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_integer_positions(config)?;
    validate_dates(config)?;
    Ok(())
}

fn validate_prices_path(config: &dyn ConfigPort) -> Result<(), TreetraderError> {
    match config.get_string("data", "prices") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TreetraderError::ConfigMissing {
            section: "data".to_string(),
            key: "prices".to_string(),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TreetraderError> {
    let value = config.get_double("backtest", "initial_capital")?;
    if !value.is_some_and(|v| v > 0.0) {
        return Err(TreetraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
            reason: "initial_capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), TreetraderError> {
    for key in ["commission_per_trade", "commission_pct"] {
        if config.get_double("backtest", key)?.unwrap_or(0.0) < 0.0 {
            return Err(TreetraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: key.to_string(),
                reason: format!("{} must be non-negative", key),
            });
        }
    }
    Ok(())
}

fn validate_integer_positions(config: &dyn ConfigPort) -> Result<(), TreetraderError> {
    config.get_bool("backtest", "integer_positions")?;
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TreetraderError> {
    let start_date = config.get_date("backtest", "start_date")?;
    let end_date = config.get_date("backtest", "end_date")?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start >= end {
            return Err(TreetraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must be before end_date".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use chrono::NaiveDate;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[data]
prices = prices.csv

[backtest]
initial_capital = 1000000
integer_positions = true
commission_per_trade = 10.0
commission_pct = 0.1
start_date = 2020-01-01
end_date = 2020-12-31
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn dates_are_optional() {
        let config = make_config("[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn missing_prices_fails() {
        let config = make_config("[backtest]\ninitial_capital = 100\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TreetraderError::ConfigMissing { key, .. } if key == "prices"));
    }

    #[test]
    fn blank_prices_fails() {
        let config = make_config("[data]\nprices =   \n[backtest]\ninitial_capital = 100\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TreetraderError::ConfigMissing { key, .. } if key == "prices"));
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[data]\nprices = p.csv\n[backtest]\ninitial_capital = -100\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn missing_initial_capital_fails() {
        let config = make_config("[data]\nprices = p.csv\n[backtest]\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn commission_per_trade_negative_fails() {
        let config = make_config(
            "[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\ncommission_per_trade = -5\n",
        );
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "commission_per_trade")
        );
    }

    #[test]
    fn commission_pct_negative_fails() {
        let config = make_config(
            "[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\ncommission_pct = -0.1\n",
        );
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "commission_pct")
        );
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config(
            "[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\nstart_date = 2020/01/01\n",
        );
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config(
            "[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\nstart_date = 2024-12-31\nend_date = 2020-01-01\n",
        );
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn only_end_date_is_fine() {
        let config = make_config(
            "[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\nend_date = 2020-01-01\n",
        );
        assert!(validate_backtest_config(&config).is_ok());
        assert_eq!(
            config.get_date("backtest", "end_date").unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 1)
        );
    }

    #[test]
    fn non_numeric_initial_capital_fails() {
        let config =
            make_config("[data]\nprices = p.csv\n[backtest]\ninitial_capital = lots\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn garbage_integer_positions_fails() {
        let config = make_config(
            "[data]\nprices = p.csv\n[backtest]\ninitial_capital = 100\ninteger_positions = sometimes\n",
        );
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, TreetraderError::ConfigInvalid { key, .. } if key == "integer_positions")
        );
    }
}
