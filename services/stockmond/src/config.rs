use std::fs;
use std::path::Path;

use anyhow::{bail, Result};
use serde::Deserialize;
use state::TrackedItem;

/// File-backed monitor configuration. Read once at startup, never re-read.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub items: Vec<TrackedItem>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_stock_pattern")]
    pub stock_pattern: String,

    #[serde(default = "default_price_pattern")]
    pub price_pattern: String,

    #[serde(default = "default_message_title")]
    pub message_title: String,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_max_workers() -> usize {
    6
}

fn default_stock_pattern() -> String {
    extract::DEFAULT_STOCK_PATTERN.to_string()
}

fn default_price_pattern() -> String {
    extract::DEFAULT_PRICE_PATTERN.to_string()
}

fn default_message_title() -> String {
    notify::DEFAULT_TITLE.to_string()
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            bail!("config must list at least one tracked item");
        }
        for item in &self.items {
            if item.url.is_empty() {
                bail!("tracked item {:?} is missing a url", item.name);
            }
            if item.name.is_empty() {
                bail!("tracked item {:?} is missing a name", item.url);
            }
        }
        if self.interval_secs == 0 {
            bail!("interval_secs must be at least 1");
        }
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal() -> MonitorConfig {
        serde_json::from_str(
            r#"{"items": [{"url": "https://fk.o808o.com/buy/5", "name": "小黑子注册码"}]}"#,
        )
        .expect("minimal config")
    }

    #[test]
    fn defaults_fill_everything_but_items() {
        let config = minimal();
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.max_workers, 6);
        assert_eq!(config.stock_pattern, extract::DEFAULT_STOCK_PATTERN);
        assert_eq!(config.price_pattern, extract::DEFAULT_PRICE_PATTERN);
        assert_eq!(config.message_title, notify::DEFAULT_TITLE);
        config.validate().expect("minimal config should validate");
    }

    #[test]
    fn rejects_empty_item_list() {
        let config: MonitorConfig = serde_json::from_str(r#"{"items": []}"#).expect("parse");
        let err = config.validate().expect_err("should reject");
        assert!(err.to_string().contains("at least one tracked item"));
    }

    #[test]
    fn rejects_zero_workers() {
        let mut config = minimal();
        config.max_workers = 0;
        let err = config.validate().expect_err("should reject");
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn rejects_zero_interval() {
        let mut config = minimal();
        config.interval_secs = 0;
        let err = config.validate().expect_err("should reject");
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn rejects_item_without_url() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"items": [{"url": "", "name": "thing"}]}"#).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"items": [{{"url": "https://example.com/buy/1", "name": "a"}}], "interval_secs": 30}}"#
        )
        .expect("write config");

        let config = MonitorConfig::load(file.path()).expect("load");
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.items.len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(MonitorConfig::load("/nonexistent/monitor.json").is_err());
    }
}
