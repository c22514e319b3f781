use crate::domain::payment::PaymentId;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("Recipient must not be the zero address")]
    #[diagnostic(code(ledger::invalid_recipient))]
    InvalidRecipient,

    #[error("Amount must be greater than zero")]
    #[diagnostic(code(ledger::invalid_amount))]
    InvalidAmount,

    #[error("Token transfer failed: {0}")]
    #[diagnostic(code(ledger::transfer_failed))]
    TransferFailed(String),

    #[error("Reentrant call rejected")]
    #[diagnostic(code(ledger::reentrant))]
    Reentrant,

    #[error("Caller is not the ledger owner")]
    #[diagnostic(code(ledger::unauthorized))]
    Unauthorized,

    #[error("Fee of {requested} bps exceeds the {max} bps ceiling")]
    #[diagnostic(code(ledger::fee_too_high))]
    FeeTooHigh { requested: u16, max: u16 },

    #[error("Account must not be the zero address")]
    #[diagnostic(code(ledger::invalid_account))]
    InvalidAccount,

    #[error("Payment {0} is already recorded")]
    #[diagnostic(code(ledger::duplicate_payment))]
    DuplicatePayment(PaymentId),

    #[error("Running total overflowed")]
    #[diagnostic(code(ledger::overflow))]
    Overflow,

    #[error("Validation error: {0}")]
    #[diagnostic(code(ledger::validation))]
    ValidationError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
