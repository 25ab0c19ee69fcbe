use amie_core::{Category, ImportSession};
use amie_import::csv::parse_statement_at;
use amie_import::{MatchingEngine, RuleSet};
use amie_storage::{CollectionStore, FinanceStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{AppError, Result};

/// Outcome of one statement import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub session_id: String,
    pub parsed: usize,
    pub rejected: usize,
    pub matched: usize,
    pub added: usize,
    pub duplicates: usize,
}

/// Parses a statement, matches it against what the store knows, saves the
/// transactions that are not already stored and logs an import session.
pub async fn import_statement<S: CollectionStore>(
    store: &FinanceStore<S>,
    filename: &str,
    text: &str,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<ImportSummary> {
    let parsed = parse_statement_at(text, now)?;
    let rejected = parsed.rejected.len();
    if parsed.transactions.is_empty() {
        return Err(AppError::NoTransactions { rejected });
    }

    let campaigns = store.load_campaigns().await?;
    let rules = RuleSet::new(store.load_matching_rules().await?);
    let creator_payments = store.load_creator_payments().await?;
    let engine = MatchingEngine::new(&campaigns, &rules, &creator_payments, &config.roster)
        .with_thresholds(config.matching);
    let matched = engine.match_all(&parsed.transactions);

    let mut session = ImportSession::record(filename, &matched, rejected, 0, now);
    let outcome = store.save_transactions(matched).await?;
    session.new_count = outcome.added;
    store.record_import_session(session.clone()).await?;

    tracing::info!(
        filename,
        parsed = session.transaction_count,
        rejected,
        matched = session.matched_count,
        added = outcome.added,
        duplicates = outcome.duplicates,
        "Imported statement"
    );

    Ok(ImportSummary {
        session_id: session.id,
        parsed: session.transaction_count,
        rejected,
        matched: session.matched_count,
        added: outcome.added,
        duplicates: outcome.duplicates,
    })
}

/// Re-runs matching over every stored transaction, e.g. after adding rules or
/// campaigns. Manually verified records are left alone. Returns how many
/// transactions changed category.
pub async fn rematch_stored<S: CollectionStore>(
    store: &FinanceStore<S>,
    config: &AppConfig,
) -> Result<usize> {
    let transactions = store.load_transactions().await?;
    let campaigns = store.load_campaigns().await?;
    let rules = RuleSet::new(store.load_matching_rules().await?);
    let creator_payments = store.load_creator_payments().await?;
    let engine = MatchingEngine::new(&campaigns, &rules, &creator_payments, &config.roster)
        .with_thresholds(config.matching);

    let rematched = engine.match_all(&transactions);
    let changed = transactions
        .iter()
        .zip(&rematched)
        .filter(|(before, after)| before.category != after.category)
        .count();
    store.replace_transactions(&rematched).await?;

    let unmatched = rematched
        .iter()
        .filter(|t| t.category == Category::Uncategorized)
        .count();
    tracing::info!(total = rematched.len(), changed, unmatched, "Re-matched stored transactions");
    Ok(changed)
}
