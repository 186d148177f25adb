//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables;
//! binaries read them once and hand the raw values to the parsing helpers below.

use crate::constants::{DEFAULT_DATABASE_URL, DEFAULT_TRANSACTION_TIMEOUT};
use crate::{ClinicError, ClinicResult, NonEmptyText};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_url: NonEmptyText,
    transaction_timeout: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if `transaction_timeout` is zero.
    pub fn new(database_url: NonEmptyText, transaction_timeout: Duration) -> ClinicResult<Self> {
        if transaction_timeout.is_zero() {
            return Err(ClinicError::InvalidInput(
                "transaction timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            database_url,
            transaction_timeout,
        })
    }

    pub fn database_url(&self) -> &str {
        self.database_url.as_str()
    }

    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }
}

/// Parse the database URL from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATABASE_URL`].
pub fn database_url_from_env_value(value: Option<String>) -> ClinicResult<NonEmptyText> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    Ok(NonEmptyText::new(
        value.as_deref().unwrap_or(DEFAULT_DATABASE_URL),
    )?)
}

/// Parse the transaction timeout (milliseconds) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_TRANSACTION_TIMEOUT`].
pub fn transaction_timeout_from_env_value(value: Option<String>) -> ClinicResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let Some(raw) = value else {
        return Ok(DEFAULT_TRANSACTION_TIMEOUT);
    };

    let millis: u64 = raw.parse().map_err(|_| {
        ClinicError::InvalidInput(format!(
            "transaction timeout must be a whole number of milliseconds, got: '{raw}'"
        ))
    })?;

    if millis == 0 {
        return Err(ClinicError::InvalidInput(
            "transaction timeout must be greater than zero".into(),
        ));
    }

    Ok(Duration::from_millis(millis))
}
