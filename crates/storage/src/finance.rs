use amie_core::{
    Campaign, CreatorPaymentInfo, ImportSession, ManualReview, MatchingRule, Transaction,
    TransactionFilter, TransactionId, MAX_IMPORT_SESSIONS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::{merge_transactions, MergeOutcome};
use crate::error::{Result, StorageError};
use crate::store::{
    get_collection, get_collection_or, load_collection, load_collection_or, set_collection,
    Collection, CollectionStore,
};

/// Everything the finance store holds, as written by [`FinanceStore::export_backup`].
/// Absent sections are left untouched on restore.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Backup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaigns: Option<Vec<Campaign>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<MatchingRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<ImportSession>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_payments: Option<Vec<CreatorPaymentInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

/// Typed access to the finance collections over any [`CollectionStore`].
///
/// Every write is a read-modify-write of the whole collection. Plain getters
/// degrade to defaults for display; the `load_*` readers and every write fail
/// instead when a collection cannot be read.
pub struct FinanceStore<S> {
    store: S,
}

impl<S: CollectionStore> FinanceStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    // ── Campaigns ────────────────────────────────────────────────────────────

    pub async fn campaigns(&self) -> Vec<Campaign> {
        get_collection(&self.store, Collection::Campaigns).await
    }

    pub async fn load_campaigns(&self) -> Result<Vec<Campaign>> {
        load_collection(&self.store, Collection::Campaigns).await
    }

    pub async fn campaign(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self.load_campaigns().await?.into_iter().find(|c| c.id == id))
    }

    /// Inserts or replaces by id. `updated_at` is stamped; an existing
    /// record's `created_at` is kept.
    pub async fn save_campaign(&self, mut campaign: Campaign, now: DateTime<Utc>) -> Result<Campaign> {
        let mut campaigns = self.load_campaigns().await?;
        campaign.updated_at = now;
        match campaigns.iter_mut().find(|c| c.id == campaign.id) {
            Some(existing) => {
                campaign.created_at = existing.created_at;
                *existing = campaign.clone();
            }
            None => campaigns.push(campaign.clone()),
        }
        set_collection(&self.store, Collection::Campaigns, &campaigns).await?;
        Ok(campaign)
    }

    pub async fn delete_campaign(&self, id: &str) -> Result<bool> {
        let mut campaigns = self.load_campaigns().await?;
        let before = campaigns.len();
        campaigns.retain(|c| c.id != id);
        if campaigns.len() == before {
            return Ok(false);
        }
        set_collection(&self.store, Collection::Campaigns, &campaigns).await?;
        Ok(true)
    }

    // ── Transactions ─────────────────────────────────────────────────────────

    pub async fn transactions(&self) -> Vec<Transaction> {
        get_collection(&self.store, Collection::Transactions).await
    }

    pub async fn load_transactions(&self) -> Result<Vec<Transaction>> {
        load_collection(&self.store, Collection::Transactions).await
    }

    pub async fn filtered_transactions(&self, filter: &TransactionFilter) -> Vec<Transaction> {
        self.transactions()
            .await
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect()
    }

    /// Inserts or replaces by id.
    pub async fn save_transaction(&self, tx: Transaction) -> Result<Transaction> {
        let mut transactions = self.load_transactions().await?;
        match transactions.iter_mut().find(|t| t.id == tx.id) {
            Some(existing) => *existing = tx.clone(),
            None => transactions.push(tx.clone()),
        }
        set_collection(&self.store, Collection::Transactions, &transactions).await?;
        Ok(tx)
    }

    /// Appends a batch, skipping rows already stored with the same date,
    /// amount and raw description.
    pub async fn save_transactions(&self, incoming: Vec<Transaction>) -> Result<MergeOutcome> {
        let existing = self.load_transactions().await?;
        let (merged, outcome) = merge_transactions(existing, incoming);
        if outcome.added > 0 {
            set_collection(&self.store, Collection::Transactions, &merged).await?;
        }
        tracing::debug!(added = outcome.added, duplicates = outcome.duplicates, "Saved transactions");
        Ok(outcome)
    }

    /// Overwrites the whole transaction collection.
    pub async fn replace_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        set_collection(&self.store, Collection::Transactions, transactions).await
    }

    /// Applies `update` to the stored transaction; `None` if no such id.
    pub async fn update_transaction<F>(&self, id: TransactionId, update: F) -> Result<Option<Transaction>>
    where
        F: FnOnce(&mut Transaction),
    {
        let mut transactions = self.load_transactions().await?;
        let Some(tx) = transactions.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        update(tx);
        let updated = tx.clone();
        set_collection(&self.store, Collection::Transactions, &transactions).await?;
        Ok(Some(updated))
    }

    pub async fn verify_transaction(
        &self,
        id: TransactionId,
        review: ManualReview,
        now: DateTime<Utc>,
    ) -> Result<Option<Transaction>> {
        self.update_transaction(id, |tx| tx.verify(review, now)).await
    }

    pub async fn delete_transaction(&self, id: TransactionId) -> Result<bool> {
        let mut transactions = self.load_transactions().await?;
        let before = transactions.len();
        transactions.retain(|t| t.id != id);
        if transactions.len() == before {
            return Ok(false);
        }
        set_collection(&self.store, Collection::Transactions, &transactions).await?;
        Ok(true)
    }

    // ── Matching rules ───────────────────────────────────────────────────────

    /// Stored rules, or the built-in defaults if none were ever saved.
    pub async fn matching_rules(&self) -> Vec<MatchingRule> {
        get_collection_or(&self.store, Collection::MatchingRules, || {
            MatchingRule::defaults(Utc::now())
        })
        .await
    }

    pub async fn load_matching_rules(&self) -> Result<Vec<MatchingRule>> {
        load_collection_or(&self.store, Collection::MatchingRules, || {
            MatchingRule::defaults(Utc::now())
        })
        .await
    }

    pub async fn save_matching_rule(&self, rule: MatchingRule) -> Result<MatchingRule> {
        let mut rules = self.load_matching_rules().await?;
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => rules.push(rule.clone()),
        }
        set_collection(&self.store, Collection::MatchingRules, &rules).await?;
        Ok(rule)
    }

    pub async fn delete_matching_rule(&self, id: &str) -> Result<bool> {
        let mut rules = self.load_matching_rules().await?;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Ok(false);
        }
        set_collection(&self.store, Collection::MatchingRules, &rules).await?;
        Ok(true)
    }

    // ── Import sessions ──────────────────────────────────────────────────────

    /// Newest first.
    pub async fn import_sessions(&self) -> Vec<ImportSession> {
        get_collection(&self.store, Collection::ImportSessions).await
    }

    pub async fn record_import_session(&self, session: ImportSession) -> Result<()> {
        let mut sessions: Vec<ImportSession> =
            load_collection(&self.store, Collection::ImportSessions).await?;
        sessions.insert(0, session);
        sessions.truncate(MAX_IMPORT_SESSIONS);
        set_collection(&self.store, Collection::ImportSessions, &sessions).await
    }

    // ── Creator payment info ─────────────────────────────────────────────────

    pub async fn creator_payments(&self) -> Vec<CreatorPaymentInfo> {
        get_collection(&self.store, Collection::CreatorPayments).await
    }

    pub async fn load_creator_payments(&self) -> Result<Vec<CreatorPaymentInfo>> {
        load_collection(&self.store, Collection::CreatorPayments).await
    }

    /// Inserts or replaces by creator id.
    pub async fn save_creator_payment(&self, info: CreatorPaymentInfo) -> Result<()> {
        let mut all = self.load_creator_payments().await?;
        match all.iter_mut().find(|c| c.creator_id == info.creator_id) {
            Some(existing) => *existing = info,
            None => all.push(info),
        }
        set_collection(&self.store, Collection::CreatorPayments, &all).await
    }

    // ── Backup ───────────────────────────────────────────────────────────────

    pub async fn export_backup(&self, now: DateTime<Utc>) -> Result<String> {
        let backup = Backup {
            campaigns: Some(self.load_campaigns().await?),
            transactions: Some(self.load_transactions().await?),
            rules: Some(self.load_matching_rules().await?),
            imports: Some(load_collection(&self.store, Collection::ImportSessions).await?),
            creator_payments: Some(self.load_creator_payments().await?),
            exported_at: Some(now),
        };
        Ok(serde_json::to_string_pretty(&backup)?)
    }

    /// Restores every section present in `json`; the rest is left as is.
    pub async fn import_backup(&self, json: &str) -> Result<()> {
        self.restore(parse_backup(json)?, false).await
    }

    /// Makes the store hold exactly what `json` holds: sections absent from
    /// the backup are removed.
    pub async fn replace_from_backup(&self, json: &str) -> Result<()> {
        self.restore(parse_backup(json)?, true).await
    }

    /// Writes every section, or none of them: if one write fails, the
    /// collections already written are put back the way they were.
    async fn restore(&self, backup: Backup, replace: bool) -> Result<()> {
        let sections = [
            (Collection::Campaigns, backup.campaigns.as_deref().map(serde_json::to_string)),
            (Collection::Transactions, backup.transactions.as_deref().map(serde_json::to_string)),
            (Collection::MatchingRules, backup.rules.as_deref().map(serde_json::to_string)),
            (Collection::ImportSessions, backup.imports.as_deref().map(serde_json::to_string)),
            (
                Collection::CreatorPayments,
                backup.creator_payments.as_deref().map(serde_json::to_string),
            ),
        ];

        let mut writes = Vec::new();
        for (collection, body) in sections {
            match body.transpose()? {
                Some(body) => writes.push((collection, Some(body))),
                None if replace => writes.push((collection, None)),
                None => {}
            }
        }

        let mut previous = Vec::with_capacity(writes.len());
        for (collection, _) in &writes {
            previous.push((*collection, self.store.load(*collection).await?));
        }

        for (done, (collection, body)) in writes.into_iter().enumerate() {
            if let Err(e) = self.put(collection, body).await {
                tracing::warn!(%collection, error = %e, "Restore failed, rolling back");
                for (collection, body) in previous.into_iter().take(done + 1) {
                    if let Err(e) = self.put(collection, body).await {
                        tracing::error!(%collection, error = %e, "Rollback failed");
                    }
                }
                return Err(e);
            }
        }

        tracing::info!(exported_at = ?backup.exported_at, replace, "Restored backup");
        Ok(())
    }

    async fn put(&self, collection: Collection, body: Option<String>) -> Result<()> {
        match body {
            Some(body) => self.store.save(collection, body).await,
            None => self.store.remove(collection).await,
        }
    }

    pub async fn clear_all(&self) -> Result<()> {
        for collection in Collection::ALL {
            self.store.remove(collection).await?;
        }
        tracing::info!("Cleared all finance data");
        Ok(())
    }
}

fn parse_backup(json: &str) -> Result<Backup> {
    serde_json::from_str(json).map_err(|e| StorageError::InvalidBackup(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::store::MemoryStore;
    use crate::test_utils::FlakyStore;
    use amie_core::{Category, Money, PaymentMethod, RulePattern, RuleTarget, TransactionType};
    use chrono::{Duration, NaiveDate};

    fn tx(day: u32, cents: i64, raw: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            raw.to_string(),
            raw.to_string(),
            Money::from_cents(cents),
            TransactionType::Debit,
            Utc::now(),
        )
    }

    fn campaign(id: &str) -> Campaign {
        Campaign::new(
            id,
            "Nike",
            "Spring",
            Money::from_cents(100_000),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc::now(),
        )
    }

    fn memory() -> FinanceStore<MemoryStore> {
        FinanceStore::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn save_campaign_keeps_created_at() {
        let store = memory();
        let t0 = Utc::now();
        let first = store.save_campaign(campaign("c1"), t0).await.unwrap();

        let mut edited = first.clone();
        edited.campaign_name = "Summer".into();
        edited.created_at = t0 + Duration::days(30);
        let t1 = t0 + Duration::hours(2);
        let saved = store.save_campaign(edited, t1).await.unwrap();

        assert_eq!(saved.created_at, first.created_at);
        assert_eq!(saved.updated_at, t1);
        let all = store.campaigns().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].campaign_name, "Summer");
        assert_eq!(store.campaign("c1").await.unwrap().unwrap().updated_at, t1);

        assert!(store.delete_campaign("c1").await.unwrap());
        assert!(!store.delete_campaign("c1").await.unwrap());
    }

    #[tokio::test]
    async fn saving_same_rows_twice_stores_one_copy() {
        let store = memory();
        let batch = vec![tx(1, 500, "ZELLE TO JANE DOE"), tx(2, 1200, "ADOBE")];

        let first = store.save_transactions(batch.clone()).await.unwrap();
        assert_eq!(first, MergeOutcome { added: 2, duplicates: 0 });

        // Re-parsing yields fresh ids; content identity still matches.
        let reparsed = vec![tx(1, 500, "ZELLE TO JANE DOE"), tx(2, 1200, "ADOBE")];
        assert_ne!(reparsed[0].id, batch[0].id);
        let second = store.save_transactions(reparsed).await.unwrap();
        assert_eq!(second, MergeOutcome { added: 0, duplicates: 2 });
        assert_eq!(store.transactions().await.len(), 2);
    }

    #[tokio::test]
    async fn update_and_verify_transaction() {
        let store = memory();
        let saved = store.save_transaction(tx(3, 999, "MYSTERY")).await.unwrap();

        let updated = store
            .update_transaction(saved.id, |t| t.notes = Some("check with ops".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("check with ops"));

        let now = Utc::now();
        let verified = store
            .verify_transaction(
                saved.id,
                ManualReview {
                    category: Category::OperatingExpense,
                    verified_by: Some("ops".into()),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap()
            .unwrap();
        assert!(verified.is_manually_verified());
        assert_eq!(store.transactions().await, vec![verified.clone()]);
        // Notes are kept when the review carries none.
        assert_eq!(verified.notes.as_deref(), Some("check with ops"));

        assert!(store
            .update_transaction(TransactionId::new(), |_| {})
            .await
            .unwrap()
            .is_none());
        assert!(store.delete_transaction(saved.id).await.unwrap());
        assert!(store.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn filtered_listing() {
        let store = memory();
        let mut payout = tx(1, 500, "ZELLE TO JANE DOE");
        payout.category = Category::CreatorPayout;
        store
            .save_transactions(vec![payout, tx(2, 100, "ADOBE")])
            .await
            .unwrap();

        let filter = TransactionFilter {
            category: Some(Category::CreatorPayout),
            ..Default::default()
        };
        let hits = store.filtered_transactions(&filter).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw_description, "ZELLE TO JANE DOE");
    }

    #[tokio::test]
    async fn rules_default_until_saved() {
        let store = memory();
        assert_eq!(store.matching_rules().await.len(), 4);

        let custom = MatchingRule {
            pattern: RulePattern::Regex("^ADOBE".into()),
            ..MatchingRule::literal(
                "rule_adobe",
                "Adobe",
                "ADOBE",
                RuleTarget::Expense,
                Category::OperatingExpense,
                3,
                Utc::now(),
            )
        };
        store.save_matching_rule(custom).await.unwrap();
        assert_eq!(store.matching_rules().await.len(), 5);

        assert!(store.delete_matching_rule("rule_zelle_out").await.unwrap());
        let ids: Vec<_> = store.matching_rules().await.into_iter().map(|r| r.id).collect();
        assert!(!ids.contains(&"rule_zelle_out".to_string()));
        assert!(ids.contains(&"rule_adobe".to_string()));
    }

    #[tokio::test]
    async fn import_sessions_newest_first_and_capped() {
        let store = memory();
        for n in 0..(MAX_IMPORT_SESSIONS + 5) {
            let session = ImportSession::record(&format!("stmt-{n}.csv"), &[], 0, 0, Utc::now());
            store.record_import_session(session).await.unwrap();
        }
        let sessions = store.import_sessions().await;
        assert_eq!(sessions.len(), MAX_IMPORT_SESSIONS);
        assert_eq!(sessions[0].filename, format!("stmt-{}.csv", MAX_IMPORT_SESSIONS + 4));
    }

    #[tokio::test]
    async fn creator_payment_upsert_by_creator() {
        let store = memory();
        let mut info = CreatorPaymentInfo {
            creator_id: "c1".into(),
            creator_name: "Jane Doe".into(),
            payment_method: PaymentMethod::Zelle,
            payment_handle: Some("jane@example.com".into()),
            notes: None,
        };
        store.save_creator_payment(info.clone()).await.unwrap();
        info.payment_method = PaymentMethod::Wire;
        store.save_creator_payment(info).await.unwrap();
        let all = store.creator_payments().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payment_method, PaymentMethod::Wire);
    }

    #[tokio::test]
    async fn backup_roundtrip_and_clear() {
        let source = memory();
        source.save_campaign(campaign("c1"), Utc::now()).await.unwrap();
        source
            .save_transactions(vec![tx(1, 500, "ZELLE TO JANE DOE")])
            .await
            .unwrap();
        let json = source.export_backup(Utc::now()).await.unwrap();

        let target = memory();
        target.import_backup(&json).await.unwrap();
        assert_eq!(target.campaigns().await, source.campaigns().await);
        assert_eq!(target.transactions().await, source.transactions().await);
        assert_eq!(target.matching_rules().await.len(), 4);

        target.clear_all().await.unwrap();
        assert!(target.campaigns().await.is_empty());
        assert!(target.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn partial_backup_leaves_other_sections() {
        let store = memory();
        store.save_campaign(campaign("c1"), Utc::now()).await.unwrap();
        store.import_backup(r#"{"transactions": []}"#).await.unwrap();
        assert_eq!(store.campaigns().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_backup_is_rejected() {
        let store = memory();
        let err = store.import_backup("not json").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidBackup(_)));
    }

    #[tokio::test]
    async fn failed_load_does_not_overwrite_history() {
        let store = FinanceStore::new(FlakyStore::new());
        let batch: Vec<_> = (1..=10).map(|d| tx(d, 100 * d as i64, "ADOBE")).collect();
        store.save_transactions(batch).await.unwrap();

        store.inner().fail_next_load();
        assert!(store.save_transactions(vec![tx(20, 1, "NEW")]).await.is_err());
        assert_eq!(store.transactions().await.len(), 10);

        store.inner().fail_next_load();
        assert!(store.save_transaction(tx(21, 1, "NEW")).await.is_err());
        store.inner().fail_next_load();
        assert!(store.delete_transaction(TransactionId::new()).await.is_err());
        assert_eq!(store.transactions().await.len(), 10);

        store.save_campaign(campaign("c1"), Utc::now()).await.unwrap();
        store.inner().fail_next_load();
        assert!(store.save_campaign(campaign("c2"), Utc::now()).await.is_err());
        assert_eq!(store.campaigns().await.len(), 1);

        // Unreadable rules must not be replaced by the defaults plus one.
        store.delete_matching_rule("rule_zelle_out").await.unwrap();
        store.inner().fail_next_load();
        let rule = MatchingRule::literal(
            "rule_x",
            "X",
            "X",
            RuleTarget::Expense,
            Category::OperatingExpense,
            1,
            Utc::now(),
        );
        assert!(store.save_matching_rule(rule).await.is_err());
        assert_eq!(store.matching_rules().await.len(), 3);

        // Listing degrades instead of failing.
        store.inner().fail_next_load();
        assert!(store.transactions().await.is_empty());
        assert_eq!(store.transactions().await.len(), 10);
    }

    #[tokio::test]
    async fn corrupt_collection_blocks_writes() {
        let store = memory();
        store
            .inner()
            .save(Collection::Transactions, "{bad".into())
            .await
            .unwrap();

        let err = store.save_transactions(vec![tx(1, 500, "ADOBE")]).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Corrupt { collection: Collection::Transactions, .. }
        ));
        assert!(store.load_transactions().await.is_err());
        assert!(store.export_backup(Utc::now()).await.is_err());
        assert_eq!(
            store.inner().load(Collection::Transactions).await.unwrap().as_deref(),
            Some("{bad")
        );
    }

    #[tokio::test]
    async fn failed_restore_rolls_back() {
        let source = memory();
        source.save_campaign(campaign("new"), Utc::now()).await.unwrap();
        source
            .save_transactions(vec![tx(5, 700, "ZELLE TO JANE DOE")])
            .await
            .unwrap();
        let json = source.export_backup(Utc::now()).await.unwrap();

        let store = FinanceStore::new(FlakyStore::new());
        store.save_campaign(campaign("old"), Utc::now()).await.unwrap();
        store.save_transactions(vec![tx(1, 100, "ADOBE")]).await.unwrap();
        let campaigns = store.campaigns().await;
        let transactions = store.transactions().await;

        // Campaigns and transactions land, then the rules write fails.
        store.inner().fail_save_after(2);
        assert!(store.import_backup(&json).await.is_err());

        assert_eq!(store.campaigns().await, campaigns);
        assert_eq!(store.transactions().await, transactions);
        assert!(store.inner().load(Collection::MatchingRules).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_restore_drops_missing_sections() {
        let store = memory();
        store.save_campaign(campaign("c1"), Utc::now()).await.unwrap();
        store
            .save_transactions(vec![tx(1, 500, "ADOBE")])
            .await
            .unwrap();

        store
            .replace_from_backup(r#"{"transactions": []}"#)
            .await
            .unwrap();
        assert!(store.campaigns().await.is_empty());
        assert!(store.transactions().await.is_empty());
        assert_eq!(store.matching_rules().await.len(), 4);
    }

    #[tokio::test]
    async fn works_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finance.db");
        let store = FinanceStore::new(SqliteStore::open(&path).await.unwrap());
        store
            .save_transactions(vec![tx(1, 500, "ZELLE TO JANE DOE")])
            .await
            .unwrap();
        store
            .save_transactions(vec![tx(1, 500, "ZELLE TO JANE DOE")])
            .await
            .unwrap();
        assert_eq!(store.transactions().await.len(), 1);
    }
}
