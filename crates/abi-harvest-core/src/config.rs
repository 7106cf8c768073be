//! Harvest run configuration.
//!
//! Defaults match the nightly job: a two-day window, 90-day provider
//! retention, and the `artifacts/` tree in the working directory. Values can
//! come from the environment (`from_env`) and be overridden by the CLI.

use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Upper bound for day-valued settings (about ten years).
pub const MAX_DAYS: i64 = 3650;

/// Settings for one harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Repository to harvest, `owner/name`
    pub repository: String,
    /// API token (never serialized)
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Root of the destination tree
    pub output: PathBuf,
    /// Eligibility window in days (inclusive)
    pub window_days: i64,
    /// Assumed artifact lifetime when the provider omits an expiry
    pub retention_days: i64,
    /// Artifacts processed concurrently
    pub concurrency: usize,
    /// Provider API root
    pub api_base: String,
    /// Artifacts per listing page
    pub page_size: u32,
    /// Wait after a rate-limited listing request
    pub rate_limit_backoff_secs: u64,
    /// Rate-limit retries per listing page
    pub rate_limit_retries: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        HarvestConfig {
            repository: String::new(),
            token: None,
            output: PathBuf::from("artifacts"),
            window_days: 2,
            retention_days: 90,
            concurrency: 4,
            api_base: "https://api.github.com".to_string(),
            page_size: 100,
            rate_limit_backoff_secs: 600,
            rate_limit_retries: 3,
        }
    }
}

impl HarvestConfig {
    /// Config for `repository` with all other settings at their defaults.
    pub fn new(repository: &str) -> Self {
        HarvestConfig {
            repository: repository.to_string(),
            ..Self::default()
        }
    }

    /// Build a config from the process environment.
    ///
    /// Reads `INPUT_REPOSITORY` (falling back to `GITHUB_REPOSITORY`),
    /// `GITHUB_TOKEN`, `INPUT_OUTPUT`, `INPUT_DAYS`, `INPUT_RETENTION_DAYS`,
    /// `INPUT_CONCURRENCY` and `GITHUB_API_URL`. Unset or empty variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(repo) = get("INPUT_REPOSITORY").or_else(|| get("GITHUB_REPOSITORY")) {
            config.repository = repo;
        }
        config.token = get("GITHUB_TOKEN");
        if let Some(output) = get("INPUT_OUTPUT") {
            config.output = PathBuf::from(output);
        }
        if let Some(days) = get("INPUT_DAYS") {
            config.window_days = parse_number("INPUT_DAYS", &days)?;
        }
        if let Some(days) = get("INPUT_RETENTION_DAYS") {
            config.retention_days = parse_number("INPUT_RETENTION_DAYS", &days)?;
        }
        if let Some(n) = get("INPUT_CONCURRENCY") {
            config.concurrency = parse_number("INPUT_CONCURRENCY", &n)?;
        }
        if let Some(api) = get("GITHUB_API_URL") {
            config.api_base = api;
        }

        Ok(config)
    }

    pub fn window(&self) -> Result<Duration> {
        days("window", self.window_days)
    }

    pub fn retention(&self) -> Result<Duration> {
        days("retention", self.retention_days)
    }

    /// Reject settings that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(HarvestError::InvalidConfig(msg));

        let mut parts = self.repository.split('/');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !well_formed {
            return invalid(format!(
                "repository must be owner/name, got {:?}",
                self.repository
            ));
        }
        self.window()?;
        self.retention()?;
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1".to_string());
        }
        if self.page_size == 0 {
            return invalid("page size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// `n` days as a duration, rejecting values outside `1..=MAX_DAYS`.
fn days(what: &str, n: i64) -> Result<Duration> {
    if !(1..=MAX_DAYS).contains(&n) {
        return Err(HarvestError::InvalidConfig(format!(
            "{what} must be between 1 and {MAX_DAYS} days, got {n}"
        )));
    }
    Duration::try_days(n)
        .ok_or_else(|| HarvestError::InvalidConfig(format!("{what} of {n} days is out of range")))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HarvestError::InvalidConfig(format!("{key} is not a number: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.window_days, 2);
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.output, PathBuf::from("artifacts"));
        assert_eq!(config.window().unwrap(), Duration::days(2));
        assert_eq!(config.retention().unwrap(), Duration::days(90));
    }

    #[test]
    fn test_from_lookup() {
        let config = HarvestConfig::from_lookup(lookup(&[
            ("GITHUB_REPOSITORY", "fallback/repo"),
            ("INPUT_REPOSITORY", "buildsi/build-abi-test-results"),
            ("GITHUB_TOKEN", "tok"),
            ("INPUT_OUTPUT", "/data/artifacts"),
            ("INPUT_DAYS", "3"),
            ("INPUT_CONCURRENCY", "8"),
        ]))
        .unwrap();

        assert_eq!(config.repository, "buildsi/build-abi-test-results");
        assert_eq!(config.token.as_deref(), Some("tok"));
        assert_eq!(config.output, PathBuf::from("/data/artifacts"));
        assert_eq!(config.window_days, 3);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.retention_days, 90);
    }

    #[test]
    fn test_repository_fallback_and_empty_values() {
        let config = HarvestConfig::from_lookup(lookup(&[
            ("INPUT_REPOSITORY", " "),
            ("GITHUB_REPOSITORY", "o/r"),
            ("INPUT_DAYS", ""),
        ]))
        .unwrap();
        assert_eq!(config.repository, "o/r");
        assert_eq!(config.window_days, 2);
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let err = HarvestConfig::from_lookup(lookup(&[("INPUT_DAYS", "two")])).unwrap_err();
        assert!(err.to_string().contains("INPUT_DAYS"));
    }

    #[test]
    fn test_validate() {
        assert!(HarvestConfig::new("o/r").validate().is_ok());
        assert!(HarvestConfig::new("").validate().is_err());
        assert!(HarvestConfig::new("noslash").validate().is_err());
        assert!(HarvestConfig::new("a/b/c").validate().is_err());
        assert!(HarvestConfig::new("/r").validate().is_err());

        let mut config = HarvestConfig::new("o/r");
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = HarvestConfig::new("o/r");
        config.window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_day_counts() {
        let mut config = HarvestConfig::new("o/r");
        config.window_days = MAX_DAYS;
        config.retention_days = MAX_DAYS;
        assert!(config.validate().is_ok());

        config.window_days = 1_000_000_000;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "invalid_config");
        assert!(config.window().is_err());

        let mut config = HarvestConfig::new("o/r");
        config.retention_days = MAX_DAYS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_env_day_count_fails_validation_without_panicking() {
        let config = HarvestConfig::from_lookup(lookup(&[
            ("INPUT_REPOSITORY", "o/r"),
            ("INPUT_DAYS", "9223372036854775807"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_not_serialized() {
        let mut config = HarvestConfig::new("o/r");
        config.token = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
