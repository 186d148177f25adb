//! API key verification shared by the HTTP surfaces.
//!
//! The expected key is resolved once at startup and injected; nothing here reads the
//! process environment.

use clinic_types::NonEmptyText;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("API key is not configured")]
    NotConfigured,
    #[error("missing x-api-key header")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// The API key callers must present.
#[derive(Clone)]
pub struct ApiKey(NonEmptyText);

impl ApiKey {
    /// Builds the key from a raw configuration value, typically `CLINIC_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotConfigured` if the value is missing or blank.
    pub fn from_env_value(value: Option<String>) -> Result<Self, AuthError> {
        value
            .and_then(|v| NonEmptyText::new(v).ok())
            .map(Self)
            .ok_or(AuthError::NotConfigured)
    }

    /// Validates the key presented by a caller.
    pub fn verify(&self, provided: Option<&str>) -> Result<(), AuthError> {
        let provided = provided.ok_or(AuthError::Missing)?;
        if provided == self.0.as_str() {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
