//! Historical price source port trait.

use crate::domain::error::TreetraderError;
use crate::domain::universe::PriceUniverse;
use chrono::NaiveDate;

pub trait PricePort {
    /// Load every column for dates within `[start, end]` (bounds optional).
    fn fetch_universe(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceUniverse, TreetraderError>;
}
