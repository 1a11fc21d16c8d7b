//! CSV price table adapter.
//!
//! Reads a wide table: a `date` column (`YYYY-MM-DD`) followed by one column
//! per security. Empty cells and `NaN` mark dates without a price.

use crate::domain::error::TreetraderError;
use crate::domain::universe::PriceUniverse;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use log::debug;
use std::fs;
use std::path::PathBuf;

pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<(Vec<String>, Vec<(NaiveDate, Vec<f64>)>), TreetraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| TreetraderError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| TreetraderError::Data {
            reason: format!("CSV header error: {}", e),
        })?;
        if headers.len() < 2 {
            return Err(TreetraderError::Data {
                reason: "expected a date column followed by at least one price column".into(),
            });
        }
        let names: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TreetraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| TreetraderError::Data {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                TreetraderError::Data {
                    reason: format!("invalid date format on row {}: {}", line + 1, e),
                }
            })?;

            let mut prices = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let cell = record.get(i + 1).unwrap_or("").trim();
                prices.push(parse_price(cell).map_err(|e| TreetraderError::Data {
                    reason: format!("invalid {} price on {}: {}", name, date, e),
                })?);
            }
            rows.push((date, prices));
        }

        rows.sort_by_key(|(date, _)| *date);
        Ok((names, rows))
    }
}

fn parse_price(cell: &str) -> Result<f64, std::num::ParseFloatError> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        Ok(f64::NAN)
    } else {
        cell.parse()
    }
}

impl PricePort for CsvPriceAdapter {
    fn fetch_universe(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceUniverse, TreetraderError> {
        let (names, rows) = self.read()?;
        let rows: Vec<_> = rows
            .into_iter()
            .filter(|(d, _)| start.is_none_or(|s| *d >= s) && end.is_none_or(|e| *d <= e))
            .collect();
        debug!("{}: {} rows, {} columns", self.path.display(), rows.len(), names.len());

        let dates = rows.iter().map(|(d, _)| *d).collect();
        let mut universe = PriceUniverse::new(dates).map_err(|e| TreetraderError::Data {
            reason: e.to_string(),
        })?;
        for (i, name) in names.iter().enumerate() {
            let column = rows.iter().map(|(_, prices)| prices[i]).collect();
            universe
                .insert_column(name, column)
                .map_err(|e| TreetraderError::Data {
                    reason: e.to_string(),
                })?;
        }
        Ok(universe)
    }
}
