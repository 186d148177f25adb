//! # API Shared
//!
//! Shared definitions for the clinic APIs.
//!
//! Contains:
//! - JSON request/response bodies with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - API key verification (`auth` module)

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{ApiKey, AuthError, API_KEY_HEADER};
pub use health::HealthService;
