//! Core domain types and logic.

pub mod backtest;
pub mod commission;
pub mod config_validation;
pub mod error;
pub mod node;
pub mod security;
pub mod series;
pub mod strategy;
pub mod universe;
