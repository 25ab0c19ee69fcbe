pub mod db;
pub mod dedup;
pub mod error;
pub mod finance;
pub mod store;
#[cfg(test)]
mod test_utils;

pub use db::{create_db, create_memory_db, DbPool, SqliteStore};
pub use dedup::{merge_transactions, MergeOutcome};
pub use error::StorageError;
pub use finance::{Backup, FinanceStore};
pub use store::{
    get_collection, get_collection_or, load_collection, load_collection_or, set_collection,
    Collection, CollectionStore, MemoryStore,
};
