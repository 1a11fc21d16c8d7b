//! Commission models supplied by strategy nodes to their securities.

/// Fee charged for trading `quantity` units at `unit_price` (price × multiplier).
///
/// Implementations must be deterministic and free of side effects: the same
/// inputs always produce the same fee.
pub trait CommissionModel {
    fn commission(&self, quantity: f64, unit_price: f64) -> f64;
}

impl<F> CommissionModel for F
where
    F: Fn(f64, f64) -> f64,
{
    fn commission(&self, quantity: f64, unit_price: f64) -> f64 {
        self(quantity, unit_price)
    }
}

/// Free trading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoCommission;

impl CommissionModel for NoCommission {
    fn commission(&self, _quantity: f64, _unit_price: f64) -> f64 {
        0.0
    }
}

/// Flat fee per trade plus a percentage of traded notional:
/// per_trade + |quantity * unit_price| * pct / 100.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TradeCommission {
    pub per_trade: f64,
    pub pct: f64,
}

impl CommissionModel for TradeCommission {
    fn commission(&self, quantity: f64, unit_price: f64) -> f64 {
        if quantity == 0.0 {
            return 0.0;
        }
        self.per_trade + (quantity * unit_price).abs() * self.pct / 100.0
    }
}
