// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{Error, Result, provider::DEFAULT_MAX_AGE};

/// Environment variable holding the default freshness window, in whole seconds.
pub const MAX_AGE_ENV: &str = "PARAMSTORE_MAX_AGE";

/// Environment variable holding the default decrypt flag of the parameter store.
pub const DECRYPT_ENV: &str = "PARAMSTORE_SSM_DECRYPT";

/// Process-level defaults applied to every provider the facade builds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use paramstore::Settings;
///
/// let settings = Settings::from_lookup(|key| match key {
///     "PARAMSTORE_MAX_AGE" => Some("60".to_string()),
///     "PARAMSTORE_SSM_DECRYPT" => Some("yes".to_string()),
///     _ => None,
/// })?;
///
/// assert_eq!(settings.max_age, Duration::from_secs(60));
/// assert!(settings.decrypt);
/// # Ok::<(), paramstore::Error>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Freshness window used when a call does not set one.
    pub max_age: Duration,
    /// Whether the parameter store decrypts secure strings by default.
    pub decrypt: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            decrypt: false,
        }
    }
}

impl Settings {
    /// Reads the settings from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a variable is set to a malformed value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a variable holds a malformed value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(raw) = lookup(MAX_AGE_ENV) {
            let seconds: u64 = raw.trim().parse().map_err(|e| {
                Error::configuration(format!("{MAX_AGE_ENV} must be a whole number of seconds, got '{raw}': {e}"))
            })?;
            settings.max_age = Duration::from_secs(seconds);
        }

        if let Some(raw) = lookup(DECRYPT_ENV) {
            settings.decrypt = parse_flag(&raw)
                .ok_or_else(|| Error::configuration(format!("{DECRYPT_ENV} must be a boolean, got '{raw}'")))?;
        }

        Ok(settings)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
