use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::period::DateRange;
use super::transaction::{Category, Transaction};

/// How many import sessions the audit log keeps.
pub const MAX_IMPORT_SESSIONS: usize = 50;

/// Audit record of one statement import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: String,
    pub filename: String,
    pub imported_at: DateTime<Utc>,
    pub transaction_count: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    /// Rows the parser discarded as malformed.
    #[serde(default)]
    pub rejected_rows: usize,
    /// Rows actually stored after de-duplication.
    #[serde(default)]
    pub new_count: usize,
    pub date_range: Option<DateRange>,
}

impl ImportSession {
    pub fn record(
        filename: &str,
        transactions: &[Transaction],
        rejected_rows: usize,
        new_count: usize,
        imported_at: DateTime<Utc>,
    ) -> Self {
        let matched_count = transactions
            .iter()
            .filter(|t| t.category != Category::Uncategorized)
            .count();
        ImportSession {
            id: format!("import_{}", Uuid::new_v4().simple()),
            filename: filename.to_string(),
            imported_at,
            transaction_count: transactions.len(),
            matched_count,
            unmatched_count: transactions.len() - matched_count,
            rejected_rows,
            new_count,
            date_range: DateRange::covering(transactions.iter().map(|t| t.date)),
        }
    }
}
