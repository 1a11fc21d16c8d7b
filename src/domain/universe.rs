//! Price universe: the shared time axis and historical price table that
//! securities are bound to at setup.

use chrono::NaiveDate;
use std::collections::HashMap;

/// Per-date price lookup keyed by security name (the slow valuation path).
pub type PriceMap = HashMap<String, f64>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("dates must be strictly increasing ({0} is out of order)")]
    UnorderedDate(NaiveDate),

    #[error("column {name} has {len} rows, expected {expected}")]
    ColumnLength {
        name: String,
        len: usize,
        expected: usize,
    },

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
}

/// Ordered dates plus one price column per security. Missing prices are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUniverse {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: HashMap<String, Vec<f64>>,
    date_index: HashMap<NaiveDate, usize>,
}

impl PriceUniverse {
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, UniverseError> {
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(UniverseError::UnorderedDate(pair[1]));
            }
        }
        let date_index = dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        Ok(Self {
            dates,
            names: Vec::new(),
            columns: HashMap::new(),
            date_index,
        })
    }

    pub fn with_column(mut self, name: &str, prices: Vec<f64>) -> Result<Self, UniverseError> {
        self.insert_column(name, prices)?;
        Ok(self)
    }

    pub fn insert_column(&mut self, name: &str, prices: Vec<f64>) -> Result<(), UniverseError> {
        if prices.len() != self.dates.len() {
            return Err(UniverseError::ColumnLength {
                name: name.to_string(),
                len: prices.len(),
                expected: self.dates.len(),
            });
        }
        if self.columns.contains_key(name) {
            return Err(UniverseError::DuplicateColumn(name.to_string()));
        }
        self.names.push(name.to_string());
        self.columns.insert(name.to_string(), prices);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Prices known on the date at `index`, skipping NaN cells.
    pub fn price_map(&self, index: usize) -> PriceMap {
        self.columns
            .iter()
            .filter_map(|(name, prices)| {
                prices
                    .get(index)
                    .filter(|p| !p.is_nan())
                    .map(|&p| (name.clone(), p))
            })
            .collect()
    }

    /// Restrict the axis to `[start, end]` (either bound optional).
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| start.is_none_or(|s| **d >= s) && end.is_none_or(|e| **d <= e))
            .map(|(i, _)| i)
            .collect();
        let dates: Vec<NaiveDate> = keep.iter().map(|&i| self.dates[i]).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, prices)| (name.clone(), keep.iter().map(|&i| prices[i]).collect()))
            .collect();
        let date_index = dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        Self {
            dates,
            names: self.names.clone(),
            columns,
            date_index,
        }
    }
}
