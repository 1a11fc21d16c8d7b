//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::validate_backtest_config;
use crate::domain::error::TreetraderError;
use crate::domain::node::Tree;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

#[derive(Parser, Debug)]
#[command(name = "treetrader", about = "Tree-structured portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an equal-weight buy-and-hold backtest over every price column
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the date range and columns of a price file
    Info {
        #[arg(short, long)]
        prices: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config } => run_backtest(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Info { prices } => run_info(&prices),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn run_backtest(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let prices = match resolve_prices_path(config_path, &adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Loading prices from {}", prices.display());

    run_backtest_pipeline(&CsvPriceAdapter::new(prices), &bt_config)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TreetraderError> {
    Ok(BacktestConfig {
        initial_capital: adapter
            .get_double("backtest", "initial_capital")?
            .unwrap_or(1_000_000.0),
        integer_positions: adapter
            .get_bool("backtest", "integer_positions")?
            .unwrap_or(true),
        commission_per_trade: adapter
            .get_double("backtest", "commission_per_trade")?
            .unwrap_or(0.0),
        commission_pct: adapter.get_double("backtest", "commission_pct")?.unwrap_or(0.0),
        start_date: adapter.get_date("backtest", "start_date")?,
        end_date: adapter.get_date("backtest", "end_date")?,
    })
}

/// The `[data] prices` path, relative paths taken from the config file's
/// directory.
pub fn resolve_prices_path(
    config_path: &Path,
    adapter: &dyn ConfigPort,
) -> Result<PathBuf, TreetraderError> {
    let prices = adapter
        .get_string("data", "prices")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TreetraderError::ConfigMissing {
            section: "data".into(),
            key: "prices".into(),
        })?;
    let prices = PathBuf::from(prices.trim());
    if prices.is_absolute() {
        return Ok(prices);
    }
    Ok(config_path
        .parent()
        .map(|dir| dir.join(&prices))
        .unwrap_or(prices))
}

/// One strategy root holding a unit-multiplier security per price column.
pub fn build_tree(columns: &[String], bt_config: &BacktestConfig) -> Result<Tree, TreetraderError> {
    let mut tree = Tree::new("treetrader", bt_config.commission());
    let root = tree.root();
    for name in columns {
        tree.add_security(root, name, 1.0)?;
    }
    Ok(tree)
}

/// Load prices through `price_port` and run the equal-weight buy-and-hold
/// strategy over them.
pub fn execute_backtest(
    price_port: &dyn PricePort,
    bt_config: &BacktestConfig,
) -> Result<BacktestResult, TreetraderError> {
    let universe = price_port.fetch_universe(bt_config.start_date, bt_config.end_date)?;
    if universe.is_empty() || universe.names().is_empty() {
        return Err(TreetraderError::Data {
            reason: "no prices in the configured date range".into(),
        });
    }

    let mut tree = build_tree(universe.names(), bt_config)?;
    eprintln!(
        "Running backtest: {} securities, {} dates",
        universe.names().len(),
        universe.len()
    );

    let result = backtest_engine::run_backtest(
        &mut tree,
        &universe,
        bt_config,
        backtest_engine::equal_weight_buy_and_hold(),
    )?;
    Ok(result)
}

pub fn run_backtest_pipeline(price_port: &dyn PricePort, bt_config: &BacktestConfig) -> ExitCode {
    match execute_backtest(price_port, bt_config) {
        Ok(result) => {
            print_summary(&result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn print_summary(result: &BacktestResult) {
    println!("=== Results ===");
    if let (Some(first), Some(last)) = (result.values.first(), result.values.last()) {
        println!("Period:           {} to {}", first.date, last.date);
    }
    if let Some(value) = result.final_value() {
        println!("Final Value:      {:.2}", value);
    }
    if let Some(ret) = result.total_return() {
        println!("Total Return:     {:.2}%", ret * 100.0);
    }
    println!("Total Trades:     {}", result.trades);
    if result.bankrupt {
        println!("Bankrupt:         yes");
    }
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    eprintln!("Config is valid");
    ExitCode::SUCCESS
}

pub fn run_info(prices: &Path) -> ExitCode {
    let adapter = CsvPriceAdapter::new(prices.to_path_buf());
    let universe = match adapter.fetch_universe(None, None) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match (universe.dates().first(), universe.dates().last()) {
        (Some(first), Some(last)) => {
            println!("{} dates, {} to {}", universe.len(), first, last)
        }
        _ => println!("no dates"),
    }
    for name in universe.names() {
        let priced = universe
            .column(name)
            .map(|c| c.iter().filter(|p| !p.is_nan()).count())
            .unwrap_or(0);
        println!("{}: {} prices", name, priced);
    }
    ExitCode::SUCCESS
}
