//! Security leaves: one tradable instrument each.
//!
//! A security owns its price/value/position/outlay series, implements the
//! per-date update state machine and turns cash allocations into whole (or
//! fractional) quantities, handing the resulting cash movement back to its
//! parent strategy.

use chrono::NaiveDate;
use log::debug;
use std::sync::Arc;

use super::error::TreeError;
use super::node::{NodeId, NodeKind, Tree};
use super::series::{truncate_to, SeriesPoint};
use super::universe::{PriceMap, PriceUniverse};

#[derive(Debug)]
pub struct Security {
    multiplier: f64,
    position: f64,
    last_position: f64,
    needs_update: bool,
    pending_outlay: f64,
    series: Option<SecuritySeries>,
}

/// Per-date rows, one cell per date of the bound universe.
#[derive(Debug)]
struct SecuritySeries {
    universe: Arc<PriceUniverse>,
    prices_bound: bool,
    prices: Vec<f64>,
    values: Vec<f64>,
    positions: Vec<f64>,
    outlays: Vec<f64>,
}

impl SecuritySeries {
    fn index_of(&self, now: Option<NaiveDate>) -> Option<usize> {
        now.and_then(|d| self.universe.index_of(d))
    }
}

/// Cash movement of a trade: `total = gross + fee`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outlay {
    pub total: f64,
    pub gross: f64,
    pub fee: f64,
}

impl Security {
    pub(crate) fn new(multiplier: f64) -> Self {
        Security {
            multiplier,
            position: 0.0,
            last_position: 0.0,
            needs_update: true,
            pending_outlay: 0.0,
            series: None,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn pending_outlay(&self) -> f64 {
        self.pending_outlay
    }

    /// True when prices come from the universe column bound at setup.
    pub fn prices_bound(&self) -> bool {
        self.series.as_ref().is_some_and(|s| s.prices_bound)
    }
}

impl Tree {
    fn security_ref(&self, id: NodeId, operation: &'static str) -> Result<&Security, TreeError> {
        match &self.node(id).kind {
            NodeKind::Security(sec) => Ok(sec),
            NodeKind::Strategy(_) => Err(self.unsupported(id, operation)),
        }
    }

    fn security_mut(&mut self, id: NodeId, operation: &'static str) -> Result<&mut Security, TreeError> {
        let node = self.node_mut(id);
        match &mut node.kind {
            NodeKind::Security(sec) => Ok(sec),
            NodeKind::Strategy(_) => Err(TreeError::UnsupportedOperation {
                node: node.name.clone(),
                operation,
            }),
        }
    }

    /// Bind a security to `universe`. If the universe has a column named
    /// after the security its prices are copied once (fast path); otherwise
    /// prices are recorded from the per-date price map passed to `update`.
    pub fn setup_security(&mut self, id: NodeId, universe: Arc<PriceUniverse>) {
        let node = self.node_mut(id);
        let NodeKind::Security(sec) = &mut node.kind else {
            return;
        };
        let len = universe.len();
        let (prices_bound, prices) = match universe.column(&node.name) {
            Some(column) => (true, column.to_vec()),
            None => (false, vec![f64::NAN; len]),
        };
        debug!(
            "setup {}: {} dates, {} prices",
            node.name,
            len,
            if prices_bound { "bound" } else { "per-date" }
        );
        sec.series = Some(SecuritySeries {
            universe,
            prices_bound,
            prices,
            values: vec![0.0; len],
            positions: vec![0.0; len],
            outlays: vec![0.0; len],
        });
    }

    /// Update price, position and value for `date`.
    ///
    /// A repeated call for the current date with an unchanged position does
    /// nothing. `index` is the offset of `date` on the bound time axis and is
    /// looked up when not supplied.
    pub(crate) fn update_security(
        &mut self,
        id: NodeId,
        date: NaiveDate,
        data: Option<&PriceMap>,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let node = self.node_mut(id);
        let NodeKind::Security(sec) = &mut node.kind else {
            return Err(TreeError::UnsupportedOperation {
                node: node.name.clone(),
                operation: "security update",
            });
        };

        if node.now == Some(date) && sec.last_position == sec.position {
            return Ok(());
        }

        let Some(series) = sec.series.as_mut() else {
            return Err(TreeError::NotSetUp {
                node: node.name.clone(),
            });
        };
        let index = match index.or_else(|| series.universe.index_of(date)) {
            Some(i) if i < series.prices.len() => i,
            _ => {
                return Err(TreeError::UnknownDate {
                    node: node.name.clone(),
                    date,
                });
            }
        };

        if node.now != Some(date) {
            node.now = Some(date);
            if series.prices_bound {
                node.price = series.prices[index];
            } else if let Some(data) = data {
                let price = data.get(&node.name).copied().unwrap_or(f64::NAN);
                node.price = price;
                series.prices[index] = price;
            }
        }

        series.positions[index] = sec.position;
        sec.last_position = sec.position;

        if node.price.is_nan() {
            if sec.position != 0.0 {
                return Err(TreeError::UnvaluableOpenPosition {
                    node: node.name.clone(),
                    position: sec.position,
                });
            }
            node.value = 0.0;
        } else {
            node.value = sec.position * node.price * sec.multiplier;
        }
        series.values[index] = node.value;

        if node.weight == 0.0 && sec.position == 0.0 {
            sec.needs_update = false;
        }

        if sec.pending_outlay != 0.0 {
            series.outlays[index] += sec.pending_outlay;
            sec.pending_outlay = 0.0;
        }
        Ok(())
    }

    /// Bring a security up to the root's date when it was traded or lags its
    /// parent.
    pub(crate) fn refresh_security(&mut self, id: NodeId) -> Result<(), TreeError> {
        let node = self.node(id);
        let needs_update = self.security_ref(id, "security refresh")?.needs_update;
        let parent_now = node.parent.map_or(node.now, |p| self.node(p).now);
        if needs_update || node.now != parent_now {
            if let Some(date) = self.now() {
                self.update_security(id, date, None, None)?;
            }
        }
        Ok(())
    }

    /// Buy (positive `amount`) or sell (negative `amount`) `amount` worth of
    /// the security at its current price.
    ///
    /// The traded quantity is rounded to whole units in integer-position mode,
    /// always in the direction that leaves capital unallocated rather than
    /// overspending. An amount equal to `-value` closes the position exactly.
    /// The full outlay (gross plus commission) is debited from the parent.
    pub(crate) fn allocate_security(
        &mut self,
        id: NodeId,
        amount: f64,
        force_update: bool,
    ) -> Result<(), TreeError> {
        let node = self.node(id);
        let parent = node.parent;
        let needs_update = self.security_ref(id, "allocate")?.needs_update;
        let reference = parent.map_or(node.now, |p| self.node(p).now);
        if needs_update || node.now != reference {
            if let Some(date) = reference {
                self.update_security(id, date, None, None)?;
            }
        }

        if amount == 0.0 {
            return Ok(());
        }

        let node = self.node(id);
        let Some(parent) = parent else {
            return Err(TreeError::InvalidParent {
                node: node.name.clone(),
            });
        };
        if node.now.is_none() {
            return Err(TreeError::NotStarted {
                node: node.name.clone(),
            });
        }
        let price = node.price;
        if price == 0.0 || price.is_nan() {
            return Err(TreeError::InvalidPrice {
                node: node.name.clone(),
                price,
                now: self.node(parent).now,
            });
        }

        let sec = self.security_ref(id, "allocate")?;
        let quantity = if amount == -node.value {
            -sec.position
        } else {
            let raw = amount / (price * sec.multiplier);
            if node.integer_positions {
                if sec.position > 0.0 || (sec.position == 0.0 && amount > 0.0) {
                    raw.floor()
                } else {
                    raw.ceil()
                }
            } else {
                raw
            }
        };

        if quantity == 0.0 || quantity.is_nan() {
            return Ok(());
        }

        let outlay = self.outlay(id, quantity)?;
        debug!(
            "{}: trade {} @ {} (gross {}, fee {})",
            self.full_name(id),
            quantity,
            price,
            outlay.gross,
            outlay.fee
        );

        let sec = self.security_mut(id, "allocate")?;
        sec.needs_update = true;
        sec.position += quantity;
        sec.pending_outlay += outlay.gross;

        self.adjust(parent, -outlay.total, force_update, false, outlay.fee)
    }

    /// Fee for trading `quantity` at `unit_price`, from the parent's
    /// commission model.
    pub fn commission(&self, id: NodeId, quantity: f64, unit_price: f64) -> Result<f64, TreeError> {
        self.security_ref(id, "commission")?;
        let node = self.node(id);
        let parent = node.parent.ok_or_else(|| TreeError::InvalidParent {
            node: node.name.clone(),
        })?;
        self.strategy_commission(parent, quantity, unit_price)
    }

    /// Cash needed to trade `quantity` at the current price.
    pub fn outlay(&self, id: NodeId, quantity: f64) -> Result<Outlay, TreeError> {
        let sec = self.security_ref(id, "outlay")?;
        let unit_price = self.node(id).price * sec.multiplier;
        let fee = self.commission(id, quantity, unit_price)?;
        let gross = quantity * unit_price;
        Ok(Outlay {
            total: gross + fee,
            gross,
            fee,
        })
    }

    /// Current quantity held. Never triggers a refresh.
    pub fn position(&self, id: NodeId) -> Result<f64, TreeError> {
        Ok(self.security_ref(id, "position")?.position)
    }

    pub fn multiplier(&self, id: NodeId) -> Result<f64, TreeError> {
        Ok(self.security_ref(id, "multiplier")?.multiplier)
    }

    pub fn positions(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        if self.security_ref(id, "positions")?.needs_update {
            if let Some(date) = self.now() {
                self.update_security(id, date, None, None)?;
            }
        }
        self.ensure_fresh()?;
        self.security_series(id, "positions", |s| &s.positions)
    }

    /// Cash consumed (positive) or returned (negative) per date, excluding
    /// commission.
    pub fn outlays(&self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        self.security_series(id, "outlays", |s| &s.outlays)
    }

    pub(crate) fn security_prices(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        self.refresh_security(id)?;
        self.security_series(id, "prices", |s| &s.prices)
    }

    pub(crate) fn security_values(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        self.refresh_security(id)?;
        self.ensure_fresh()?;
        self.security_series(id, "values", |s| &s.values)
    }

    fn security_series(
        &self,
        id: NodeId,
        operation: &'static str,
        column: impl Fn(&SecuritySeries) -> &Vec<f64>,
    ) -> Result<Vec<SeriesPoint>, TreeError> {
        let sec = self.security_ref(id, operation)?;
        let node = self.node(id);
        let series = sec.series.as_ref().ok_or_else(|| TreeError::NotSetUp {
            node: node.name.clone(),
        })?;
        Ok(truncate_to(
            series.universe.dates(),
            column(series),
            series.index_of(node.now),
        ))
    }
}
