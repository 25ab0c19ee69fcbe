use amie_import::{FormatError, RuleError};
use amie_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Statement(#[from] FormatError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error("No transactions found in statement ({rejected} rows rejected)")]
    NoTransactions { rejected: usize },
    #[error("{0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
