use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::error::Result;
use crate::store::{Collection, CollectionStore};

pub type DbPool = Pool<Sqlite>;

/// Opens (creating if needed) the SQLite database at `path`.
pub async fn create_db(path: &Path) -> std::result::Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    configure(&pool).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// A private in-memory database. The pool keeps its single connection alive,
/// since the data disappears with it.
pub async fn create_memory_db() -> std::result::Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    configure(&pool).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

async fn configure(pool: &DbPool) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migrations(pool: &DbPool) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Collections persisted as JSON documents in one SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            pool: create_db(path).await?,
        })
    }

    pub async fn in_memory() -> Result<Self> {
        Ok(Self {
            pool: create_memory_db().await?,
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl CollectionStore for SqliteStore {
    async fn load(&self, collection: Collection) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT body FROM collections WHERE name = ?")
            .bind(collection.key())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn save(&self, collection: Collection, body: String) -> Result<()> {
        sqlx::query(
            "INSERT INTO collections (name, body, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(collection.key())
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, collection: Collection) -> Result<()> {
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(collection.key())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
