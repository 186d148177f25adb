//! Constants used throughout the clinic core crate.

use std::time::Duration;

/// Database used when `DATABASE_URL` is not set. `mode=rwc` creates the file on first start.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://clinic.db?mode=rwc";

/// Upper bound on how long a ledger transaction may stay open.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Entity names used in not-found errors.
pub const MEDICINE_ENTITY: &str = "medicine";
pub const ACTION_ENTITY: &str = "action";
pub const MEDICAL_RECORD_ENTITY: &str = "medical record";
