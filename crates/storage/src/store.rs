use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{Result, StorageError};

/// Named collections the finance data is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Campaigns,
    Transactions,
    MatchingRules,
    ImportSessions,
    CreatorPayments,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Campaigns,
        Collection::Transactions,
        Collection::MatchingRules,
        Collection::ImportSessions,
        Collection::CreatorPayments,
    ];

    /// Stable storage key; changing one orphans existing data.
    pub fn key(self) -> &'static str {
        match self {
            Collection::Campaigns => "amie_finance_campaigns",
            Collection::Transactions => "amie_finance_transactions",
            Collection::MatchingRules => "amie_finance_rules",
            Collection::ImportSessions => "amie_finance_imports",
            Collection::CreatorPayments => "amie_finance_creator_payments",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Key/value persistence of whole collections as JSON text.
///
/// Writes replace the entire collection; the last writer wins.
pub trait CollectionStore: Send + Sync {
    fn load(&self, collection: Collection) -> impl Future<Output = Result<Option<String>>> + Send;

    fn save(&self, collection: Collection, body: String) -> impl Future<Output = Result<()>> + Send;

    fn remove(&self, collection: Collection) -> impl Future<Output = Result<()>> + Send;
}

/// Reads a collection for a read-modify-write. Absent means `default`; a
/// failing back end or an undecodable body is an error, so the caller never
/// overwrites history it could not read.
pub async fn load_collection_or<T, S, F>(store: &S, collection: Collection, default: F) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: CollectionStore,
    F: FnOnce() -> Vec<T>,
{
    match store.load(collection).await? {
        Some(body) => serde_json::from_str(&body)
            .map_err(|source| StorageError::Corrupt { collection, source }),
        None => Ok(default()),
    }
}

pub async fn load_collection<T, S>(store: &S, collection: Collection) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: CollectionStore,
{
    load_collection_or(store, collection, Vec::new).await
}

/// Reads a collection for display, falling back to `default` when it is
/// absent. A failing back end or an undecodable body also yields the default,
/// with a warning. Never feed the result back into a write.
pub async fn get_collection_or<T, S, F>(store: &S, collection: Collection, default: F) -> Vec<T>
where
    T: DeserializeOwned,
    S: CollectionStore,
    F: Fn() -> Vec<T>,
{
    match load_collection_or(store, collection, &default).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(%collection, error = %e, "Failed to read collection, using default");
            default()
        }
    }
}

pub async fn get_collection<T, S>(store: &S, collection: Collection) -> Vec<T>
where
    T: DeserializeOwned,
    S: CollectionStore,
{
    get_collection_or(store, collection, Vec::new).await
}

pub async fn set_collection<T, S>(store: &S, collection: Collection, items: &[T]) -> Result<()>
where
    T: Serialize,
    S: CollectionStore,
{
    let body = serde_json::to_string(items)?;
    store.save(collection, body).await
}

/// Process-local store, used in tests and for dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionStore for MemoryStore {
    async fn load(&self, collection: Collection) -> Result<Option<String>> {
        Ok(self.collections.read().await.get(&collection).cloned())
    }

    async fn save(&self, collection: Collection, body: String) -> Result<()> {
        self.collections.write().await.insert(collection, body);
        Ok(())
    }

    async fn remove(&self, collection: Collection) -> Result<()> {
        self.collections.write().await.remove(&collection);
        Ok(())
    }
}
