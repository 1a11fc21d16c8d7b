//! Configuration access port trait.

use crate::domain::error::TreetraderError;
use chrono::NaiveDate;

/// Typed lookups into a sectioned key/value config.
///
/// A missing or blank key is `Ok(None)`. A present value that does not parse
/// as the requested type is `ConfigInvalid`, never silently defaulted.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, TreetraderError>;
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, TreetraderError>;
    /// `YYYY-MM-DD`.
    fn get_date(&self, section: &str, key: &str) -> Result<Option<NaiveDate>, TreetraderError>;
}
