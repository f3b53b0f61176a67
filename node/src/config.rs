// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::errors::{FeedError, Result};
use std::time::Duration;
use strata_kernel::config::{DEFAULT_PAGE_SIZE, DEFAULT_POLLING_INTERVAL_MS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedConfig {
    pub polling_interval: Duration,
    /// Commits fetched per subscriber per poll cycle.
    pub page_size: usize,
    /// Queue length below which a drained subscriber asks for another poll.
    /// Defaults to `page_size`.
    pub backpressure_threshold: Option<usize>,
    /// Number of full pages kept in the LRU page cache.
    pub cache_capacity: usize,
    pub stats_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_millis(DEFAULT_POLLING_INTERVAL_MS),
            page_size: DEFAULT_PAGE_SIZE,
            backpressure_threshold: None,
            cache_capacity: 128,
            stats_interval: Duration::from_secs(1),
        }
    }
}

impl FeedConfig {
    pub fn threshold(&self) -> usize {
        self.backpressure_threshold.unwrap_or(self.page_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling_interval.is_zero() {
            return Err(FeedError::InvalidConfig("polling interval must be positive".into()));
        }
        if self.stats_interval.is_zero() {
            return Err(FeedError::InvalidConfig("statistics interval must be positive".into()));
        }
        if self.page_size == 0 {
            return Err(FeedError::InvalidConfig("page size must be at least 1".into()));
        }
        if self.threshold() == 0 {
            return Err(FeedError::InvalidConfig("backpressure threshold must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(FeedError::InvalidConfig("cache capacity must be at least 1 page".into()));
        }
        Ok(())
    }

    /// Defaults overlaid with `STRATA_POLL_MS`, `STRATA_PAGE_SIZE`,
    /// `STRATA_THRESHOLD` and `STRATA_CACHE_PAGES` when set.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(ms) = parse_var(&lookup, "STRATA_POLL_MS")? {
            self.polling_interval = Duration::from_millis(ms as u64);
        }
        if let Some(size) = parse_var(&lookup, "STRATA_PAGE_SIZE")? {
            self.page_size = size;
        }
        if let Some(threshold) = parse_var(&lookup, "STRATA_THRESHOLD")? {
            self.backpressure_threshold = Some(threshold);
        }
        if let Some(pages) = parse_var(&lookup, "STRATA_CACHE_PAGES")? {
            self.cache_capacity = pages;
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| FeedError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_threshold_defaults_to_page_size() {
        let config = FeedConfig { page_size: 25, ..Default::default() };
        assert_eq!(config.threshold(), 25);
        let config = FeedConfig { backpressure_threshold: Some(10), ..config };
        assert_eq!(config.threshold(), 10);
    }

    #[test]
    fn test_overrides_are_applied_and_validated() {
        let vars: HashMap<&str, &str> =
            [("STRATA_POLL_MS", "50"), ("STRATA_PAGE_SIZE", "25"), ("STRATA_THRESHOLD", "10")].into();
        let config = FeedConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.polling_interval, Duration::from_millis(50));
        assert_eq!(config.page_size, 25);
        assert_eq!(config.threshold(), 10);

        let bad = FeedConfig::default().with_overrides(|k| (k == "STRATA_PAGE_SIZE").then(|| "many".to_string()));
        assert!(matches!(bad, Err(FeedError::InvalidConfig(_))));

        let zero = FeedConfig::default().with_overrides(|k| (k == "STRATA_POLL_MS").then(|| "0".to_string()));
        assert!(matches!(zero, Err(FeedError::InvalidConfig(_))));
    }
}
