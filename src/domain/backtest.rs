//! Backtest driver: the per-date event loop that feeds prices to a tree and
//! hands control to strategy code between the two daily updates.
//!
//! [`BacktestConfig`] carries the run parameters read from the `[backtest]`
//! config section.

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::Arc;

use super::commission::TradeCommission;
use super::error::TreeError;
use super::node::{NodeId, Tree};
use super::series::SeriesPoint;
use super::universe::PriceUniverse;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub integer_positions: bool,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BacktestConfig {
    pub fn commission(&self) -> TradeCommission {
        TradeCommission {
            per_trade: self.commission_per_trade,
            pct: self.commission_pct,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Root price index per date.
    pub prices: Vec<SeriesPoint>,
    pub values: Vec<SeriesPoint>,
    /// Traded notional per date as a fraction of the root's value.
    pub turnover: Vec<SeriesPoint>,
    /// Number of (security, date) pairs with a non-zero outlay.
    pub trades: usize,
    pub bankrupt: bool,
}

impl BacktestResult {
    pub fn final_value(&self) -> Option<f64> {
        self.values.last().map(|p| p.value)
    }

    /// Return of the price index over the whole run, as a fraction.
    pub fn total_return(&self) -> Option<f64> {
        let first = self.prices.first()?.value;
        let last = self.prices.last()?.value;
        if first == 0.0 {
            return None;
        }
        Some(last / first - 1.0)
    }
}

/// Run `on_date` over every date of `universe` within the configured range.
///
/// Each date the tree is updated with that date's prices, `on_date` trades,
/// and the tree is updated again so the trades are reflected in the series.
/// Once the root goes bankrupt strategy code is no longer called.
pub fn run_backtest<F>(
    tree: &mut Tree,
    universe: &PriceUniverse,
    config: &BacktestConfig,
    mut on_date: F,
) -> Result<BacktestResult, TreeError>
where
    F: FnMut(&mut Tree, NaiveDate) -> Result<(), TreeError>,
{
    let root = tree.root();
    let universe = Arc::new(universe.between(config.start_date, config.end_date));
    info!(
        "backtest over {} dates with initial capital {}",
        universe.len(),
        config.initial_capital
    );

    tree.use_integer_positions(root, config.integer_positions);
    tree.setup(Arc::clone(&universe));
    tree.adjust(root, config.initial_capital, true, true, 0.0)?;

    for (index, &date) in universe.dates().iter().enumerate() {
        let data = universe.price_map(index);
        tree.update(date, Some(&data), Some(index))?;
        if tree.is_bankrupt(root)? {
            debug!("{}: bankrupt, skipping strategy", date);
        } else {
            on_date(tree, date)?;
        }
        tree.update(date, Some(&data), Some(index))?;
    }

    let prices = tree.prices(root)?;
    let values = tree.values(root)?;
    let (turnover, trades) = turnover(tree, root, &values)?;
    let bankrupt = tree.is_bankrupt(root)?;
    if bankrupt {
        warn!("backtest finished with {} bankrupt", tree.node(root).name());
    }

    Ok(BacktestResult {
        prices,
        values,
        turnover,
        trades,
        bankrupt,
    })
}

fn turnover(
    tree: &Tree,
    root: NodeId,
    values: &[SeriesPoint],
) -> Result<(Vec<SeriesPoint>, usize), TreeError> {
    let mut bought = vec![0.0; values.len()];
    let mut sold = vec![0.0; values.len()];
    let mut trades = 0;

    for security in tree.securities(root) {
        for (i, point) in tree.outlays(security)?.iter().take(values.len()).enumerate() {
            if point.value > 0.0 {
                bought[i] += point.value;
            } else if point.value < 0.0 {
                sold[i] -= point.value;
            }
            if point.value != 0.0 {
                trades += 1;
            }
        }
    }

    let series = values
        .iter()
        .enumerate()
        .map(|(i, point)| SeriesPoint {
            date: point.date,
            value: if point.value != 0.0 {
                bought[i].min(sold[i]) / point.value
            } else {
                0.0
            },
        })
        .collect();
    Ok((series, trades))
}

/// Strategy callback that splits the root's value equally over every child
/// with a usable price on the first such date, then holds.
pub fn equal_weight_buy_and_hold() -> impl FnMut(&mut Tree, NaiveDate) -> Result<(), TreeError> {
    let mut invested = false;
    move |tree, date| {
        if invested {
            return Ok(());
        }
        let root = tree.root();
        let mut tradable = Vec::new();
        for child in tree.children(root).to_vec() {
            let price = tree.price(child)?;
            if price.is_finite() && price > 0.0 {
                tradable.push(child);
            }
        }
        if tradable.is_empty() {
            debug!("{}: nothing tradable yet", date);
            return Ok(());
        }
        let weight = 1.0 / tradable.len() as f64;
        let base = tree.value(root)?;
        for child in tradable {
            tree.rebalance(root, child, weight, Some(base))?;
        }
        invested = true;
        Ok(())
    }
}
