use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(TransactionId)
            .map_err(|e| format!("Invalid transaction id '{s}': {e}"))
    }
}

/// Direction of cash flow relative to the agency's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Credit => write!(f, "credit"),
            TransactionType::Debit => write!(f, "debit"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            other => Err(format!("Unknown transaction type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BrandPayment,
    CreatorPayout,
    OperatingExpense,
    Refund,
    #[default]
    Uncategorized,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::BrandPayment => write!(f, "brand_payment"),
            Category::CreatorPayout => write!(f, "creator_payout"),
            Category::OperatingExpense => write!(f, "operating_expense"),
            Category::Refund => write!(f, "refund"),
            Category::Uncategorized => write!(f, "uncategorized"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "brand_payment" => Ok(Category::BrandPayment),
            "creator_payout" => Ok(Category::CreatorPayout),
            "operating_expense" => Ok(Category::OperatingExpense),
            "refund" => Ok(Category::Refund),
            "uncategorized" => Ok(Category::Uncategorized),
            other => Err(format!("Unknown category: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Buckets a 0–100 match score: ≥80 high, ≥50 medium, >0 low, else none.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => ConfidenceLevel::High,
            50..=79 => ConfidenceLevel::Medium,
            1..=49 => ConfidenceLevel::Low,
            0 => ConfidenceLevel::None,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::None => write!(f, "none"),
            ConfidenceLevel::Low => write!(f, "low"),
            ConfidenceLevel::Medium => write!(f, "medium"),
            ConfidenceLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    #[default]
    Auto,
    Manual,
    Rule,
}

impl fmt::Display for MatchedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedBy::Auto => write!(f, "auto"),
            MatchedBy::Manual => write!(f, "manual"),
            MatchedBy::Rule => write!(f, "rule"),
        }
    }
}

/// One bank-statement line item after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub description: String,
    /// Source text exactly as exported; all pattern matching runs against this.
    pub raw_description: String,
    /// Always non-negative; direction lives in `transaction_type`.
    pub amount: Money,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub balance: Option<Money>,
    pub check_number: Option<String>,

    pub category: Category,

    pub matched_campaign_id: Option<String>,
    pub matched_creator_id: Option<String>,
    pub match_confidence: u8,
    pub match_confidence_level: ConfidenceLevel,
    pub matched_by: MatchedBy,
    pub match_reason: Option<String>,

    pub imported_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub notes: Option<String>,
}

/// A reviewer's decision for one transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualReview {
    pub category: Category,
    pub campaign_id: Option<String>,
    pub creator_id: Option<String>,
    pub notes: Option<String>,
    pub verified_by: Option<String>,
}

impl Transaction {
    /// A freshly imported, unmatched transaction.
    pub fn new(
        date: NaiveDate,
        description: String,
        raw_description: String,
        amount: Money,
        transaction_type: TransactionType,
        imported_at: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id: TransactionId::new(),
            date,
            description,
            raw_description,
            amount: amount.abs(),
            transaction_type,
            balance: None,
            check_number: None,
            category: Category::Uncategorized,
            matched_campaign_id: None,
            matched_creator_id: None,
            match_confidence: 0,
            match_confidence_level: ConfidenceLevel::None,
            matched_by: MatchedBy::Auto,
            match_reason: None,
            imported_at,
            verified_at: None,
            verified_by: None,
            notes: None,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.transaction_type == TransactionType::Credit
    }

    pub fn is_debit(&self) -> bool {
        self.transaction_type == TransactionType::Debit
    }

    /// Manual verification is terminal: the matcher must leave these alone.
    pub fn is_manually_verified(&self) -> bool {
        self.matched_by == MatchedBy::Manual && self.verified_at.is_some()
    }

    /// Content identity used for de-duplication across imports. Ids are not
    /// stable between parses of the same file, so they are not part of it.
    pub fn content_key(&self) -> (NaiveDate, Money, &str) {
        (self.date, self.amount, self.raw_description.as_str())
    }

    /// Manual records always read as fully verified, whatever their score.
    pub fn effective_confidence_level(&self) -> ConfidenceLevel {
        if self.matched_by == MatchedBy::Manual {
            ConfidenceLevel::High
        } else {
            self.match_confidence_level
        }
    }

    pub fn verify(&mut self, review: ManualReview, now: DateTime<Utc>) {
        self.category = review.category;
        self.matched_campaign_id = review.campaign_id;
        self.matched_creator_id = review.creator_id;
        if review.notes.is_some() {
            self.notes = review.notes;
        }
        self.verified_by = review.verified_by;
        self.matched_by = MatchedBy::Manual;
        self.match_confidence = 100;
        self.match_confidence_level = ConfidenceLevel::High;
        self.verified_at = Some(now);
    }
}

/// Search/category/type filter used by transaction listings.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub transaction_type: Option<TransactionType>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        let search_hit = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(query) => {
                let query = query.to_lowercase();
                tx.description.to_lowercase().contains(&query)
                    || tx.raw_description.to_lowercase().contains(&query)
            }
        };
        search_hit
            && self.category.map_or(true, |c| tx.category == c)
            && self.transaction_type.map_or(true, |t| tx.transaction_type == t)
    }
}
