use thiserror::Error;

use crate::domain::{AmountError, PersonId, TransactionId};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Person name must not be empty")]
    EmptyPersonName,

    #[error("No person with id: {0}")]
    MissingPerson(PersonId),

    #[error("Transaction amount must be nonzero")]
    ZeroAmount,

    #[error("Ledger service has stopped")]
    ServiceStopped,

    #[error("Database error: {0}")]
    Storage(#[from] anyhow::Error),
}
