use amie::cli::{self, Cli};
use amie::{AppConfig, AppState};
use amie_storage::SqliteStore;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::resolve(cli.config.as_deref())?;

    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let db_path = config.database_path()?;
    tracing::debug!(path = %db_path.display(), "Opening finance database");
    let store = SqliteStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let state = AppState::new(store, config);
    cli::run(cli.command, &state).await?;

    state.store.inner().pool().close().await;
    Ok(())
}
