//! Controller configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sync period used when an App does not configure one.
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_secs(30);

/// Exclusive upper bound of the jitter added to successful resyncs.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(10);

/// Configuration for the installed-package controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Sync period for Apps that leave it unset (seconds).
    #[serde(with = "pkgctl_core::duration::secs", default = "default_sync_period")]
    pub default_sync_period: Duration,

    /// Resync jitter is drawn from `[0, max_jitter)` (seconds).
    #[serde(with = "pkgctl_core::duration::secs", default = "default_max_jitter")]
    pub max_jitter: Duration,

    /// Service account for intents that do not name one.
    #[serde(default)]
    pub default_service_account: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_sync_period: default_sync_period(),
            max_jitter: default_max_jitter(),
            default_service_account: None,
        }
    }
}

impl ControllerConfig {
    /// Set the default sync period.
    #[must_use]
    pub const fn with_default_sync_period(mut self, period: Duration) -> Self {
        self.default_sync_period = period;
        self
    }

    /// Set the jitter bound.
    #[must_use]
    pub const fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Set the default service account.
    #[must_use]
    pub fn with_default_service_account(mut self, name: impl Into<String>) -> Self {
        self.default_service_account = Some(name.into());
        self
    }

    /// Parse configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the text is not valid TOML for this
    /// struct or fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| Error::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load configuration from environment variables, starting from defaults.
    ///
    /// - `PKGCTL_DEFAULT_SYNC_PERIOD`: seconds
    /// - `PKGCTL_MAX_JITTER`: seconds
    /// - `PKGCTL_SERVICE_ACCOUNT`: default service account
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(secs) = lookup("PKGCTL_DEFAULT_SYNC_PERIOD") {
            config.default_sync_period = parse_secs("PKGCTL_DEFAULT_SYNC_PERIOD", &secs)?;
        }

        if let Some(secs) = lookup("PKGCTL_MAX_JITTER") {
            config.max_jitter = parse_secs("PKGCTL_MAX_JITTER", &secs)?;
        }

        if let Some(account) = lookup("PKGCTL_SERVICE_ACCOUNT") {
            config.default_service_account = Some(account);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for a zero default sync period. A zero
    /// jitter bound is allowed and disables jitter.
    pub fn validate(&self) -> Result<()> {
        if self.default_sync_period.is_zero() {
            return Err(Error::invalid_config(
                "default_sync_period must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_secs(var: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| Error::invalid_config(format!("{var}={value}: {e}")))
}

const fn default_sync_period() -> Duration {
    DEFAULT_SYNC_PERIOD
}

const fn default_max_jitter() -> Duration {
    DEFAULT_MAX_JITTER
}
