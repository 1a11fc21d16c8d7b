//! INI file configuration adapter.

use crate::domain::error::TreetraderError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TreetraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| TreetraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TreetraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TreetraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Trimmed value, with blank treated as unset.
    fn raw(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn typed<T>(
        &self,
        section: &str,
        key: &str,
        expected: &str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<Option<T>, TreetraderError> {
        let Some(value) = self.raw(section, key) else {
            return Ok(None);
        };
        parse(&value)
            .map(Some)
            .ok_or_else(|| TreetraderError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("expected {}, got {:?}", expected, value),
            })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, TreetraderError> {
        self.typed(section, key, "a number", |v| {
            v.parse::<f64>().ok().filter(|x| x.is_finite())
        })
    }

    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, TreetraderError> {
        self.typed(section, key, "true/false, yes/no or 1/0", parse_bool)
    }

    fn get_date(&self, section: &str, key: &str) -> Result<Option<NaiveDate>, TreetraderError> {
        self.typed(section, key, "a YYYY-MM-DD date", |v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d").ok()
        })
    }
}
