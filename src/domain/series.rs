//! Time-indexed series rows exposed by node accessors.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Pair `values` with `dates` up to and including `index`.
pub fn truncate_to(dates: &[NaiveDate], values: &[f64], index: Option<usize>) -> Vec<SeriesPoint> {
    let Some(index) = index else {
        return Vec::new();
    };
    dates
        .iter()
        .zip(values)
        .take(index + 1)
        .map(|(&date, &value)| SeriesPoint { date, value })
        .collect()
}
