use thiserror::Error;

use crate::store::Collection;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Stored collection {collection} is unreadable: {source}")]
    Corrupt {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid backup data format: {0}")]
    InvalidBackup(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
