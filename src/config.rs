// ⚙️ Configuration
//
// Layering: built-in defaults, then an optional JSON file named by
// MOSQUE_DUES_CONFIG, then individual MOSQUE_DUES_* environment variables.

use crate::reconciliation::DEFAULT_MAX_SPAN_MONTHS;
use crate::status::DEFAULT_DEFAULTER_THRESHOLD;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_ENV: &str = "MOSQUE_DUES_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuesConfig {
    pub database_path: PathBuf,
    pub max_span_months: u32,
    pub defaulter_threshold: usize,
    pub notice_min_missing_months: usize,
    pub bind_addr: String,
    pub mosque_name: String,
    pub currency: String,
}

impl Default for DuesConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("mosque-dues.db"),
            max_span_months: DEFAULT_MAX_SPAN_MONTHS,
            defaulter_threshold: DEFAULT_DEFAULTER_THRESHOLD,
            notice_min_missing_months: 1,
            bind_addr: "127.0.0.1:3000".to_string(),
            mosque_name: "Masjid".to_string(),
            currency: "PKR".to_string(),
        }
    }
}

impl DuesConfig {
    /// Defaults, then the config file (if set), then the environment.
    pub fn load() -> Result<Self> {
        let base = match env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides(|name| env::var(name).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply MOSQUE_DUES_* overrides read through `lookup`.
    ///
    /// Values that fail to parse are ignored and the current value is kept.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MOSQUE_DUES_DB") {
            self.database_path = PathBuf::from(path);
        }
        self.max_span_months = parsed(&lookup, "MOSQUE_DUES_MAX_SPAN_MONTHS", self.max_span_months);
        self.defaulter_threshold =
            parsed(&lookup, "MOSQUE_DUES_DEFAULTER_THRESHOLD", self.defaulter_threshold);
        self.notice_min_missing_months = parsed(
            &lookup,
            "MOSQUE_DUES_NOTICE_MIN_MONTHS",
            self.notice_min_missing_months,
        );
        if let Some(addr) = lookup("MOSQUE_DUES_BIND") {
            self.bind_addr = addr;
        }
        if let Some(name) = lookup("MOSQUE_DUES_NAME") {
            self.mosque_name = name;
        }
        if let Some(currency) = lookup("MOSQUE_DUES_CURRENCY") {
            self.currency = currency;
        }
        self
    }
}

fn parsed<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(name)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DuesConfig::default();
        assert_eq!(config.max_span_months, 600);
        assert_eq!(config.defaulter_threshold, 3);
        assert_eq!(config.notice_min_missing_months, 1);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MOSQUE_DUES_DB", "/tmp/dues.db"),
            ("MOSQUE_DUES_MAX_SPAN_MONTHS", "120"),
            ("MOSQUE_DUES_DEFAULTER_THRESHOLD", "not-a-number"),
            ("MOSQUE_DUES_CURRENCY", "USD"),
        ]
        .into_iter()
        .collect();

        let config = DuesConfig::default()
            .with_env_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/tmp/dues.db"));
        assert_eq!(config.max_span_months, 120);
        assert_eq!(config.defaulter_threshold, 3);
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mosque_name": "Masjid Al-Huda", "defaulter_threshold": 6}}"#).unwrap();

        let config = DuesConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mosque_name, "Masjid Al-Huda");
        assert_eq!(config.defaulter_threshold, 6);
        assert_eq!(config.max_span_months, 600);
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(DuesConfig::from_file(file.path()).is_err());
    }
}
