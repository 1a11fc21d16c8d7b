//! Strategy nodes: composites that hold cash, own children and supply the
//! commission model their securities trade with.
//!
//! A strategy's value is its capital plus the value of its children. Its
//! price is a return index starting at [`PAR`] that ignores capital flows,
//! so injecting or withdrawing cash does not register as performance.

use chrono::NaiveDate;
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

use super::commission::CommissionModel;
use super::error::TreeError;
use super::node::{NodeId, NodeKind, Tree};
use super::series::{truncate_to, SeriesPoint};
use super::universe::{PriceMap, PriceUniverse};

/// Starting level of every strategy price index.
pub const PAR: f64 = 100.0;

pub struct Strategy {
    capital: f64,
    net_flows: f64,
    last_value: f64,
    last_price: f64,
    fees: f64,
    bankrupt: bool,
    commission: Box<dyn CommissionModel>,
    series: Option<StrategySeries>,
}

#[derive(Debug)]
struct StrategySeries {
    universe: Arc<PriceUniverse>,
    prices: Vec<f64>,
    values: Vec<f64>,
    cash: Vec<f64>,
    fees: Vec<f64>,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("capital", &self.capital)
            .field("net_flows", &self.net_flows)
            .field("last_value", &self.last_value)
            .field("last_price", &self.last_price)
            .field("fees", &self.fees)
            .field("bankrupt", &self.bankrupt)
            .finish_non_exhaustive()
    }
}

impl Strategy {
    pub(crate) fn new(commission: impl CommissionModel + 'static) -> Self {
        Strategy {
            capital: 0.0,
            net_flows: 0.0,
            last_value: 0.0,
            last_price: PAR,
            fees: 0.0,
            bankrupt: false,
            commission: Box::new(commission),
            series: None,
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn net_flows(&self) -> f64 {
        self.net_flows
    }

    pub fn bankrupt(&self) -> bool {
        self.bankrupt
    }
}

impl Tree {
    fn strategy_ref(&self, id: NodeId, operation: &'static str) -> Result<&Strategy, TreeError> {
        match &self.node(id).kind {
            NodeKind::Strategy(strat) => Ok(strat),
            NodeKind::Security(_) => Err(self.unsupported(id, operation)),
        }
    }

    fn strategy_mut(&mut self, id: NodeId, operation: &'static str) -> Result<&mut Strategy, TreeError> {
        let node = self.node_mut(id);
        match &mut node.kind {
            NodeKind::Strategy(strat) => Ok(strat),
            NodeKind::Security(_) => Err(TreeError::UnsupportedOperation {
                node: node.name.clone(),
                operation,
            }),
        }
    }

    pub(crate) fn setup_strategy(&mut self, id: NodeId, universe: Arc<PriceUniverse>) {
        let NodeKind::Strategy(strat) = &mut self.node_mut(id).kind else {
            return;
        };
        let len = universe.len();
        strat.series = Some(StrategySeries {
            universe,
            prices: vec![f64::NAN; len],
            values: vec![0.0; len],
            cash: vec![0.0; len],
            fees: vec![0.0; len],
        });
    }

    /// The universe a strategy was bound to by `setup`, if any.
    pub(crate) fn strategy_universe(&self, id: NodeId) -> Option<Arc<PriceUniverse>> {
        match &self.node(id).kind {
            NodeKind::Strategy(strat) => strat.series.as_ref().map(|s| Arc::clone(&s.universe)),
            NodeKind::Security(_) => None,
        }
    }

    pub(crate) fn strategy_commission(
        &self,
        id: NodeId,
        quantity: f64,
        unit_price: f64,
    ) -> Result<f64, TreeError> {
        let strat = self.strategy_ref(id, "commission")?;
        Ok(strat.commission.commission(quantity, unit_price))
    }

    /// Change a strategy's capital by `amount`.
    ///
    /// `is_flow` marks external capital (deposits, withdrawals, transfers
    /// from a parent) which the price index must not count as return. `fee`
    /// is recorded against the current date. With `force_update` the tree is
    /// marked stale.
    pub fn adjust(
        &mut self,
        id: NodeId,
        amount: f64,
        force_update: bool,
        is_flow: bool,
        fee: f64,
    ) -> Result<(), TreeError> {
        let strat = self.strategy_mut(id, "adjust")?;
        strat.capital += amount;
        strat.fees += fee;
        if is_flow {
            strat.net_flows += amount;
        }
        if force_update {
            self.stale = true;
        }
        Ok(())
    }

    pub(crate) fn update_strategy(
        &mut self,
        id: NodeId,
        date: NaiveDate,
        data: Option<&PriceMap>,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let node = self.node_mut(id);
        let NodeKind::Strategy(strat) = &mut node.kind else {
            return Err(TreeError::UnsupportedOperation {
                node: node.name.clone(),
                operation: "strategy update",
            });
        };
        let Some(series) = strat.series.as_ref() else {
            return Err(TreeError::NotSetUp {
                node: node.name.clone(),
            });
        };
        let index = match index.or_else(|| series.universe.index_of(date)) {
            Some(i) if i < series.values.len() => i,
            _ => {
                return Err(TreeError::UnknownDate {
                    node: node.name.clone(),
                    date,
                });
            }
        };

        if node.now != Some(date) {
            // Flows booked before the first date seed the opening base.
            if node.now.is_some() {
                strat.net_flows = 0.0;
            }
            node.now = Some(date);
            strat.last_value = node.value;
            strat.last_price = node.price;
            strat.fees = 0.0;
        }

        let children = node.children.clone();
        for &child in &children {
            self.update_node(child, date, data, Some(index))?;
        }

        let node = self.node(id);
        let strat = self.strategy_ref(id, "strategy update")?;
        let value = strat.capital + children.iter().map(|&c| self.node(c).value).sum::<f64>();
        let base = strat.last_value + strat.net_flows;
        let ret = if base != 0.0 {
            value / base - 1.0
        } else if value == 0.0 {
            0.0
        } else {
            return Err(TreeError::ZeroBase {
                node: node.name.clone(),
                date,
            });
        };
        let price = strat.last_price * (1.0 + ret);
        let is_root = node.parent.is_none();

        for &child in &children {
            let child_node = self.node_mut(child);
            child_node.weight = if value != 0.0 {
                child_node.value / value
            } else {
                0.0
            };
        }

        let node = self.node_mut(id);
        node.value = value;
        node.price = price;
        if is_root {
            node.weight = 1.0;
        }
        let name = node.name.clone();
        let NodeKind::Strategy(strat) = &mut node.kind else {
            return Ok(());
        };
        if value < 0.0 && !strat.bankrupt {
            warn!("{} is bankrupt on {}: value {:.2}", name, date, value);
            strat.bankrupt = true;
        }
        if let Some(series) = strat.series.as_mut() {
            series.prices[index] = price;
            series.values[index] = value;
            series.cash[index] = strat.capital;
            series.fees[index] = strat.fees;
        }
        Ok(())
    }

    /// Move `amount` of new capital into a strategy and spread it over its
    /// children in proportion to their current weights. A sub-strategy takes
    /// the cash from its parent.
    pub(crate) fn allocate_strategy(
        &mut self,
        id: NodeId,
        amount: f64,
        force_update: bool,
    ) -> Result<(), TreeError> {
        self.strategy_ref(id, "allocate")?;
        self.ensure_fresh()?;

        if let Some(parent) = self.node(id).parent {
            self.adjust(parent, -amount, false, false, 0.0)?;
        }
        self.adjust(id, amount, false, true, 0.0)?;

        let targets: Vec<(NodeId, f64)> = self
            .node(id)
            .children
            .iter()
            .map(|&c| (c, self.node(c).weight))
            .filter(|(_, w)| *w != 0.0)
            .collect();
        debug!(
            "{}: allocate {} over {} children",
            self.full_name(id),
            amount,
            targets.len()
        );
        for (child, weight) in targets {
            self.allocate(child, amount * weight, false)?;
        }

        if force_update {
            self.stale = true;
        }
        Ok(())
    }

    /// Trade `child` towards `weight` of `base` (the parent's value when not
    /// given). A target weight of zero closes the child.
    pub fn rebalance(
        &mut self,
        parent: NodeId,
        child: NodeId,
        weight: f64,
        base: Option<f64>,
    ) -> Result<(), TreeError> {
        self.require_child(parent, child, "rebalance")?;
        if weight == 0.0 {
            return self.close(parent, child);
        }
        let base = match base {
            Some(b) => b,
            None => self.value(parent)?,
        };
        let delta = weight - self.weight(child)?;
        self.allocate(child, delta * base, true)
    }

    /// Liquidate `child` completely, returning its value to `parent`.
    pub fn close(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.require_child(parent, child, "close")?;
        if !self.node(child).is_security() {
            self.flatten(child)?;
        }
        let value = self.value(child)?;
        self.allocate(child, -value, true)
    }

    /// Close every child that holds value.
    pub fn flatten(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.strategy_ref(id, "flatten")?;
        let children = self.node(id).children.clone();
        for child in children {
            if self.value(child)? != 0.0 {
                self.close(id, child)?;
            }
        }
        Ok(())
    }

    fn require_child(
        &self,
        parent: NodeId,
        child: NodeId,
        operation: &'static str,
    ) -> Result<(), TreeError> {
        self.strategy_ref(parent, operation)?;
        if self.node(child).parent != Some(parent) {
            return Err(self.unsupported(child, operation));
        }
        Ok(())
    }

    /// Cash held directly by the strategy. Never triggers a refresh.
    pub fn capital(&self, id: NodeId) -> Result<f64, TreeError> {
        Ok(self.strategy_ref(id, "capital")?.capital)
    }

    pub fn is_bankrupt(&self, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.strategy_ref(id, "bankrupt")?.bankrupt)
    }

    /// Commission paid per date.
    pub fn fees(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        self.ensure_fresh()?;
        self.strategy_series(id, "fees", |s| &s.fees)
    }

    /// Capital held per date.
    pub fn cash(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        self.ensure_fresh()?;
        self.strategy_series(id, "cash", |s| &s.cash)
    }

    pub(crate) fn strategy_prices(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        self.ensure_fresh()?;
        self.strategy_series(id, "prices", |s| &s.prices)
    }

    pub(crate) fn strategy_values(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        self.ensure_fresh()?;
        self.strategy_series(id, "values", |s| &s.values)
    }

    fn strategy_series(
        &self,
        id: NodeId,
        operation: &'static str,
        column: impl Fn(&StrategySeries) -> &Vec<f64>,
    ) -> Result<Vec<SeriesPoint>, TreeError> {
        let strat = self.strategy_ref(id, operation)?;
        let node = self.node(id);
        let series = strat.series.as_ref().ok_or_else(|| TreeError::NotSetUp {
            node: node.name.clone(),
        })?;
        let index = node.now.and_then(|d| series.universe.index_of(d));
        Ok(truncate_to(series.universe.dates(), column(series), index))
    }
}
