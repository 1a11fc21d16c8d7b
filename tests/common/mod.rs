#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Arc;
use treetrader::domain::backtest::BacktestConfig;
use treetrader::domain::commission::NoCommission;
use treetrader::domain::error::TreetraderError;
use treetrader::domain::node::{NodeId, NodeKind, Tree};
use treetrader::domain::security::Security;
use treetrader::domain::universe::PriceUniverse;
use treetrader::ports::price_port::PricePort;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Consecutive January 2024 dates starting on the 1st.
pub fn days(n: u32) -> Vec<NaiveDate> {
    (1..=n).map(|d| date(2024, 1, d)).collect()
}

pub fn make_universe(columns: &[(&str, Vec<f64>)]) -> PriceUniverse {
    let len = columns.first().map(|(_, c)| c.len()).unwrap_or(0) as u32;
    let mut universe = PriceUniverse::new(days(len)).unwrap();
    for (name, prices) in columns {
        universe.insert_column(name, prices.clone()).unwrap();
    }
    universe
}

/// A strategy root funded with `capital` on the first date, holding one
/// security per column, updated to the first date.
pub fn funded_tree(universe: PriceUniverse, capital: f64) -> (Tree, Vec<NodeId>) {
    let mut tree = Tree::new("s", NoCommission);
    let root = tree.root();
    let ids = universe
        .names()
        .iter()
        .map(|name| tree.add_security(root, name, 1.0).unwrap())
        .collect();
    let first = universe.dates()[0];
    tree.setup(Arc::new(universe));
    tree.adjust(root, capital, true, true, 0.0).unwrap();
    tree.update(first, None, None).unwrap();
    (tree, ids)
}

pub fn security(tree: &Tree, id: NodeId) -> &Security {
    match tree.node(id).kind() {
        NodeKind::Security(sec) => sec,
        NodeKind::Strategy(_) => panic!("{} is not a security", tree.node(id).name()),
    }
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        initial_capital: 10_000.0,
        integer_positions: true,
        commission_per_trade: 0.0,
        commission_pct: 0.0,
        start_date: None,
        end_date: None,
    }
}

pub struct MockPricePort {
    pub universe: Option<PriceUniverse>,
    pub error: Option<String>,
}

impl MockPricePort {
    pub fn new(universe: PriceUniverse) -> Self {
        Self {
            universe: Some(universe),
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            universe: None,
            error: Some(reason.to_string()),
        }
    }
}

impl PricePort for MockPricePort {
    fn fetch_universe(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceUniverse, TreetraderError> {
        if let Some(reason) = &self.error {
            return Err(TreetraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .universe
            .as_ref()
            .map(|u| u.between(start, end))
            .unwrap_or_else(|| PriceUniverse::new(Vec::new()).unwrap()))
    }
}
