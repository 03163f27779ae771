use thiserror::Error;

use crate::domain::{
    AllocationTarget, AttributionError, ExecutionError, Money, ParseAmountError, ScheduleError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Family not found: {0}")]
    FamilyNotFound(String),

    #[error("Income event not found: {0}")]
    IncomeEventNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Attribution not found: {0}")]
    AttributionNotFound(String),

    #[error("Scheduled report not found: {0}")]
    ScheduledReportNotFound(String),

    #[error("Scheduled report already exists: {0}")]
    ScheduledReportAlreadyExists(String),

    #[error("Invalid schedule parameter: {0}")]
    InvalidScheduleParameter(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Over-allocation of {target}: cap {cap}, already attributed {attributed}, requested {requested}")]
    OverAllocation {
        target: AllocationTarget,
        cap: Money,
        attributed: Money,
        requested: Money,
    },

    #[error("Record is cancelled: {0}")]
    RecordCancelled(String),

    #[error("Invalid attribution: {0}")]
    InvalidAttribution(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Report aggregation failed: {0}")]
    AggregationFailure(String),

    #[error("Report delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Invalid execution state: {0}")]
    InvalidExecutionState(#[from] ExecutionError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::InvalidScheduleParameter(msg) => AppError::InvalidScheduleParameter(msg),
        }
    }
}

impl From<ParseAmountError> for AppError {
    fn from(err: ParseAmountError) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}

impl From<AttributionError> for AppError {
    fn from(err: AttributionError) -> Self {
        match err {
            AttributionError::InvalidAmount(amount) => {
                AppError::InvalidAmount(format!("attribution amount must be positive, got {}", amount))
            }
            AttributionError::OverAllocation {
                target,
                cap,
                attributed,
                requested,
            } => AppError::OverAllocation {
                target,
                cap,
                attributed,
                requested,
            },
            other @ (AttributionError::Cancelled(_) | AttributionError::FamilyMismatch) => {
                AppError::InvalidAttribution(other.to_string())
            }
        }
    }
}
