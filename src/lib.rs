//! treetrader: tree-structured portfolio valuation and backtesting.
//!
//! Hexagonal architecture: the node tree and its valuation logic in
//! [`domain`], port traits in [`ports`], concrete implementations in
//! [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
