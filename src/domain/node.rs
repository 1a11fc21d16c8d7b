//! Arena-backed node tree.
//!
//! Every node lives in a [`Tree`] and is addressed by a copyable [`NodeId`].
//! Parent and root links are handles, never owning references. The tree owns
//! the session-wide staleness flag: any mutation that may invalidate cached
//! aggregates marks the tree stale, and every lazy read calls
//! [`Tree::ensure_fresh`] before returning a cached number.
//!
//! Leaf behaviour lives in [`super::security`], composite behaviour in
//! [`super::strategy`]; both extend `Tree` with their own `impl` blocks.

use chrono::NaiveDate;
use std::sync::Arc;

use super::commission::CommissionModel;
use super::error::TreeError;
use super::security::Security;
use super::series::SeriesPoint;
use super::strategy::Strategy;
use super::universe::{PriceMap, PriceUniverse};

/// Handle to a node inside the [`Tree`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
pub enum NodeKind {
    Security(Security),
    Strategy(Strategy),
}

#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) root: NodeId,
    pub(crate) children: Vec<NodeId>,
    pub(crate) now: Option<NaiveDate>,
    pub(crate) price: f64,
    pub(crate) value: f64,
    pub(crate) weight: f64,
    pub(crate) integer_positions: bool,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Current logical date; `None` until the first update.
    pub fn now(&self) -> Option<NaiveDate> {
        self.now
    }

    pub fn is_security(&self) -> bool {
        matches!(self.kind, NodeKind::Security(_))
    }

    pub fn integer_positions(&self) -> bool {
        self.integer_positions
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

#[derive(Debug)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) stale: bool,
}

const ROOT: NodeId = NodeId(0);

impl Tree {
    /// A tree whose root is a strategy node charging `commission`.
    pub fn new(root_name: &str, commission: impl CommissionModel + 'static) -> Self {
        Self::with_root(root_name, NodeKind::Strategy(Strategy::new(commission)))
    }

    /// A tree made of a single parentless security. It can be valued but
    /// never receives allocations.
    pub fn with_security_root(name: &str, multiplier: f64) -> Self {
        Self::with_root(name, NodeKind::Security(Security::new(multiplier)))
    }

    fn with_root(name: &str, kind: NodeKind) -> Self {
        let price = initial_price(&kind);
        Tree {
            nodes: vec![Node {
                name: name.to_string(),
                parent: None,
                root: ROOT,
                children: Vec::new(),
                now: None,
                price,
                value: 0.0,
                weight: 0.0,
                integer_positions: true,
                kind,
            }],
            stale: false,
        }
    }

    pub fn add_security(
        &mut self,
        parent: NodeId,
        name: &str,
        multiplier: f64,
    ) -> Result<NodeId, TreeError> {
        self.attach(parent, name, NodeKind::Security(Security::new(multiplier)))
    }

    pub fn add_strategy(
        &mut self,
        parent: NodeId,
        name: &str,
        commission: impl CommissionModel + 'static,
    ) -> Result<NodeId, TreeError> {
        self.attach(parent, name, NodeKind::Strategy(Strategy::new(commission)))
    }

    fn attach(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId, TreeError> {
        let parent_node = self.node(parent);
        if parent_node.is_security() {
            return Err(self.unsupported(parent, "adding children"));
        }
        if self.child(parent, name).is_some() {
            return Err(TreeError::DuplicateName {
                parent: parent_node.name.clone(),
                name: name.to_string(),
            });
        }

        let id = NodeId(self.nodes.len());
        let price = initial_price(&kind);
        let node = Node {
            name: name.to_string(),
            parent: Some(parent),
            root: parent_node.root,
            children: Vec::new(),
            now: None,
            price,
            value: 0.0,
            weight: 0.0,
            integer_positions: parent_node.integer_positions,
            kind,
        };
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);

        // Late additions share the parent's time axis.
        if let Some(universe) = self.strategy_universe(parent) {
            if self.node(id).is_security() {
                self.setup_security(id, universe);
            } else {
                self.setup_strategy(id, universe);
            }
        }
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Panics if `id` was not handed out by this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|c| self.node(*c).name == name)
    }

    /// Ancestor names joined with `>`, root first.
    pub fn full_name(&self, id: NodeId) -> String {
        let node = self.node(id);
        match node.parent {
            Some(parent) => format!("{}>{}", self.full_name(parent), node.name),
            None => node.name.clone(),
        }
    }

    /// `id` followed by all of its descendants, depth first.
    pub fn members(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        for &child in &self.node(id).children {
            out.extend(self.members(child));
        }
        out
    }

    pub fn securities(&self, id: NodeId) -> Vec<NodeId> {
        self.members(id)
            .into_iter()
            .filter(|m| self.node(*m).is_security())
            .collect()
    }

    /// The root's current date.
    pub fn now(&self) -> Option<NaiveDate> {
        self.node(ROOT).now
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn use_integer_positions(&mut self, id: NodeId, integer_positions: bool) {
        for member in self.members(id) {
            self.node_mut(member).integer_positions = integer_positions;
        }
    }

    /// Bind every node to `universe`.
    pub fn setup(&mut self, universe: Arc<PriceUniverse>) {
        for member in self.members(ROOT) {
            if self.node(member).is_security() {
                self.setup_security(member, Arc::clone(&universe));
            } else {
                self.setup_strategy(member, Arc::clone(&universe));
            }
        }
    }

    /// Refresh the whole tree at the root's current date if anything is stale.
    pub fn ensure_fresh(&mut self) -> Result<(), TreeError> {
        if !self.stale {
            return Ok(());
        }
        match self.now() {
            Some(date) => self.update(date, None, None),
            None => {
                self.stale = false;
                Ok(())
            }
        }
    }

    /// Advance the root (and with it the whole tree) to `date`.
    pub fn update(
        &mut self,
        date: NaiveDate,
        data: Option<&PriceMap>,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        // Settle pending trades on the current date before moving on.
        if self.stale && self.now().is_some_and(|now| now != date) {
            self.ensure_fresh()?;
        }
        self.update_node(ROOT, date, data, index)?;
        self.stale = false;
        Ok(())
    }

    pub fn update_node(
        &mut self,
        id: NodeId,
        date: NaiveDate,
        data: Option<&PriceMap>,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        if self.node(id).is_security() {
            self.update_security(id, date, data, index)
        } else {
            self.update_strategy(id, date, data, index)
        }
    }

    /// Place a trade (securities) or route capital (strategies), sized in cash.
    pub fn allocate(&mut self, id: NodeId, amount: f64, force_update: bool) -> Result<(), TreeError> {
        if self.node(id).is_security() {
            self.allocate_security(id, amount, force_update)
        } else {
            self.allocate_strategy(id, amount, force_update)
        }
    }

    pub fn value(&mut self, id: NodeId) -> Result<f64, TreeError> {
        self.ensure_fresh()?;
        Ok(self.node(id).value)
    }

    pub fn weight(&mut self, id: NodeId) -> Result<f64, TreeError> {
        self.ensure_fresh()?;
        Ok(self.node(id).weight)
    }

    pub fn price(&mut self, id: NodeId) -> Result<f64, TreeError> {
        if self.node(id).is_security() {
            self.refresh_security(id)?;
        } else {
            self.ensure_fresh()?;
        }
        Ok(self.node(id).price)
    }

    pub fn prices(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        if self.node(id).is_security() {
            self.security_prices(id)
        } else {
            self.strategy_prices(id)
        }
    }

    pub fn values(&mut self, id: NodeId) -> Result<Vec<SeriesPoint>, TreeError> {
        if self.node(id).is_security() {
            self.security_values(id)
        } else {
            self.strategy_values(id)
        }
    }

    pub(crate) fn unsupported(&self, id: NodeId, operation: &'static str) -> TreeError {
        TreeError::UnsupportedOperation {
            node: self.node(id).name.clone(),
            operation,
        }
    }
}

fn initial_price(kind: &NodeKind) -> f64 {
    match kind {
        NodeKind::Security(_) => f64::NAN,
        NodeKind::Strategy(_) => super::strategy::PAR,
    }
}
