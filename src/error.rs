use crate::domain::money::Money;
use miette::Diagnostic;
use thiserror::Error;

/// Stable classification of a [`LedgerError`].
///
/// The API layer maps each kind to a distinct response; store and
/// serialization failures all collapse into `Internal` so nothing about the
/// persistence engine leaks upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    InvalidAmount,
    InsufficientBalance,
    RetryableConflict,
    InvalidPin,
    Internal,
}

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("{0} not found")]
    #[diagnostic(code(paylink::not_found))]
    NotFound(String),

    #[error("conflict: {0}")]
    #[diagnostic(code(paylink::conflict))]
    Conflict(String),

    #[error("unauthorized")]
    #[diagnostic(code(paylink::unauthorized))]
    Unauthorized,

    #[error("invalid amount: {0}")]
    #[diagnostic(code(paylink::invalid_amount))]
    InvalidAmount(String),

    #[error("insufficient balance: {current} available")]
    #[diagnostic(code(paylink::insufficient_balance))]
    InsufficientBalance { current: Money },

    #[error("lost a concurrent write race")]
    #[diagnostic(
        code(paylink::retryable_conflict),
        help("the operation can be retried")
    )]
    RetryableConflict,

    #[error("PIN must be 4 to 6 ASCII digits")]
    #[diagnostic(code(paylink::invalid_pin))]
    InvalidPin,

    #[error("invalid configuration: {0}")]
    #[diagnostic(code(paylink::config))]
    Config(String),

    #[error("script row is missing `{0}`")]
    #[diagnostic(code(paylink::missing_field))]
    MissingField(&'static str),

    #[error("CSV error: {0}")]
    #[diagnostic(code(paylink::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(paylink::io))]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    #[diagnostic(code(paylink::internal))]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::Unauthorized => ErrorKind::Unauthorized,
            LedgerError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::RetryableConflict => ErrorKind::RetryableConflict,
            LedgerError::InvalidPin => ErrorKind::InvalidPin,
            LedgerError::Config(_)
            | LedgerError::MissingField(_)
            | LedgerError::Csv(_)
            | LedgerError::Io(_)
            | LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        LedgerError::Internal(Box::new(std::io::Error::other(message.into())))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Internal(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::Internal(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
