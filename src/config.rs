//! Ledger tuning knobs.
//!
//! Defaults suit production. Override via `PAYLINK_*` environment variables
//! or explicit construction for tests.

use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Extra attempts after losing a compare-and-set race.
    pub max_retries: u32,
    /// Upper bound on waiting for the store's commit lock.
    pub lock_timeout_ms: u64,
    /// log2 of the number of hashing rounds applied to PINs.
    pub hash_cost: u32,
    /// Page size for pair history when the caller gives none.
    pub default_history_limit: usize,
    /// Page size for a user's cross-merchant history when the caller gives none.
    pub default_user_history_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            lock_timeout_ms: 250,
            hash_cost: 12,
            default_history_limit: 50,
            default_user_history_limit: 100,
        }
    }
}

impl LedgerConfig {
    /// Load overrides from environment variables.
    ///
    /// Variables (all optional):
    /// - `PAYLINK_MAX_RETRIES`
    /// - `PAYLINK_LOCK_TIMEOUT_MS`
    /// - `PAYLINK_HASH_COST`
    /// - `PAYLINK_HISTORY_LIMIT`
    /// - `PAYLINK_USER_HISTORY_LIMIT`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        override_from(&lookup, "PAYLINK_MAX_RETRIES", &mut config.max_retries)?;
        override_from(&lookup, "PAYLINK_LOCK_TIMEOUT_MS", &mut config.lock_timeout_ms)?;
        override_from(&lookup, "PAYLINK_HASH_COST", &mut config.hash_cost)?;
        override_from(
            &lookup,
            "PAYLINK_HISTORY_LIMIT",
            &mut config.default_history_limit,
        )?;
        override_from(
            &lookup,
            "PAYLINK_USER_HISTORY_LIMIT",
            &mut config.default_user_history_limit,
        )?;
        Ok(config)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn override_from<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    target: &mut T,
) -> Result<()> {
    if let Some(raw) = lookup(var) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| LedgerError::Config(format!("{var}={raw:?} is not a valid value")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = LedgerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_overrides_apply() {
        let config = LedgerConfig::from_lookup(|name| match name {
            "PAYLINK_MAX_RETRIES" => Some("7".to_string()),
            "PAYLINK_HASH_COST" => Some(" 8 ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.hash_cost, 8);
        assert_eq!(config.default_history_limit, 50);
    }

    #[test]
    fn test_rejects_garbage() {
        let result = LedgerConfig::from_lookup(|name| {
            (name == "PAYLINK_LOCK_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig = serde_json::from_str(r#"{"max_retries": 1}"#).unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.hash_cost, 12);
    }
}
