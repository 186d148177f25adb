use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("no {0} found")]
    NoneFound(&'static str),

    #[error(
        "insufficient stock for medicine {medicine_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        medicine_id: Uuid,
        requested: i64,
        available: i64,
    },
    #[error("medical record {0} is already paid")]
    AlreadyPaid(Uuid),
    #[error("amount overflow while totalling medical record")]
    AmountOverflow,

    #[error("stored value is invalid: {0}")]
    InvalidStoredValue(String),
    #[error("transaction exceeded its deadline of {0:?}")]
    TransactionTimeout(Duration),
    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl ClinicError {
    /// True for errors caused by the request content rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClinicError::InvalidInput(_)
                | ClinicError::NotFound { .. }
                | ClinicError::NoneFound(_)
                | ClinicError::InsufficientStock { .. }
                | ClinicError::AlreadyPaid(_)
                | ClinicError::AmountOverflow
        )
    }
}

impl From<clinic_types::TextError> for ClinicError {
    fn from(e: clinic_types::TextError) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

impl From<clinic_types::QuantityError> for ClinicError {
    fn from(e: clinic_types::QuantityError) -> Self {
        ClinicError::InvalidInput(e.to_string())
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
