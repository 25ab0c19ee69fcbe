use amie_core::{
    Campaign, Category, ConfidenceLevel, CreatorPaymentInfo, MatchedBy, RosterCreator, RuleTarget,
    Transaction,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::extract::{Extractor, Identifiers};
use crate::fuzzy::similarity;
use crate::rules::RuleSet;

pub const CONFIDENCE_CREATOR_HANDLE: u8 = 90;
pub const CONFIDENCE_ROSTER_NAME: u8 = 75;
pub const CONFIDENCE_BRAND: u8 = 70;
pub const CONFIDENCE_BRAND_AMOUNT: u8 = 95;
pub const CONFIDENCE_RULE: u8 = 60;
pub const CONFIDENCE_EXPENSE_KEYWORD: u8 = 50;
pub const CONFIDENCE_PAYMENT_RAIL: u8 = 40;

pub const OPERATING_EXPENSE_KEYWORDS: [&str; 12] = [
    "ADOBE",
    "GOOGLE",
    "AMAZON",
    "AWS",
    "OFFICE",
    "SOFTWARE",
    "SUBSCRIPTION",
    "INTERNET",
    "PHONE",
    "UTILITY",
    "RENT",
    "INSURANCE",
];

/// Which step of the cascade produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    CreatorHandle,
    RosterName,
    CampaignBrand,
    Rule,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub strategy: MatchStrategy,
    pub confidence: u8,
    pub category: Category,
    pub campaign_id: Option<String>,
    pub creator_id: Option<String>,
    pub reason: String,
}

impl MatchResult {
    fn new(strategy: MatchStrategy, confidence: u8, category: Category, reason: String) -> Self {
        MatchResult {
            strategy,
            confidence,
            category,
            campaign_id: None,
            creator_id: None,
            reason,
        }
    }
}

/// Cutoffs for fuzzy entity matching. Similarity must be strictly greater
/// than the cutoff; the amount difference strictly less than the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    pub name_similarity: f32,
    pub company_similarity: f32,
    pub amount_tolerance: Decimal,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            name_similarity: 0.7,
            company_similarity: 0.6,
            amount_tolerance: Decimal::ONE,
        }
    }
}

/// Classifies statement transactions against known campaigns, creators and rules.
pub struct MatchingEngine<'a> {
    campaigns: &'a [Campaign],
    rules: &'a RuleSet,
    creator_payments: &'a [CreatorPaymentInfo],
    roster: &'a [RosterCreator],
    thresholds: MatchThresholds,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(
        campaigns: &'a [Campaign],
        rules: &'a RuleSet,
        creator_payments: &'a [CreatorPaymentInfo],
        roster: &'a [RosterCreator],
    ) -> Self {
        Self {
            campaigns,
            rules,
            creator_payments,
            roster,
            thresholds: MatchThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Returns a new record with the match applied. Manually verified records
    /// come back unchanged.
    pub fn match_transaction(&self, tx: &Transaction) -> Transaction {
        if tx.is_manually_verified() {
            return tx.clone();
        }

        let mut matched = tx.clone();
        matched.matched_by = MatchedBy::Auto;
        match self.classify(tx) {
            Some(result) => {
                tracing::debug!(
                    id = %tx.id,
                    strategy = ?result.strategy,
                    category = %result.category,
                    confidence = result.confidence,
                    "Matched transaction"
                );
                matched.category = result.category;
                matched.match_confidence = result.confidence;
                matched.match_confidence_level = ConfidenceLevel::from_score(result.confidence);
                matched.matched_campaign_id = result.campaign_id;
                matched.matched_creator_id = result.creator_id;
                matched.match_reason = Some(result.reason);
            }
            None => {
                tracing::trace!(id = %tx.id, raw = %tx.raw_description, "No match");
                matched.category = Category::Uncategorized;
                matched.match_confidence = 0;
                matched.match_confidence_level = ConfidenceLevel::None;
                matched.matched_campaign_id = None;
                matched.matched_creator_id = None;
                matched.match_reason = None;
            }
        }
        matched
    }

    pub fn match_all(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        transactions
            .iter()
            .map(|tx| self.match_transaction(tx))
            .collect()
    }

    /// Runs the cascade; the first strategy that produces a result wins.
    pub fn classify(&self, tx: &Transaction) -> Option<MatchResult> {
        let ids = Extractor::extract(&tx.raw_description);
        let upper = tx.raw_description.to_uppercase();

        let entity = if tx.is_debit() {
            self.match_creator(&upper, &ids)
        } else {
            self.match_campaign(tx, &upper, &ids)
        };

        entity
            .or_else(|| self.match_rule(tx))
            .or_else(|| heuristic(tx, &upper))
    }

    fn match_creator(&self, upper: &str, ids: &Identifiers) -> Option<MatchResult> {
        let contains = |needle: &str| {
            let needle = needle.trim();
            !needle.is_empty() && upper.contains(&needle.to_uppercase())
        };

        for info in self.creator_payments {
            let handle_hit = info.payment_handle.as_deref().is_some_and(contains);
            if handle_hit || contains(info.creator_name.as_str()) {
                let mut result = MatchResult::new(
                    MatchStrategy::CreatorHandle,
                    CONFIDENCE_CREATOR_HANDLE,
                    Category::CreatorPayout,
                    format!("Matched creator payment handle: {}", info.creator_name),
                );
                result.creator_id = Some(info.creator_id.clone());
                return Some(result);
            }
        }

        self.roster
            .iter()
            .find(|creator| {
                ids.possible_names
                    .iter()
                    .any(|name| similarity(name, &creator.name) > self.thresholds.name_similarity)
            })
            .map(|creator| {
                let mut result = MatchResult::new(
                    MatchStrategy::RosterName,
                    CONFIDENCE_ROSTER_NAME,
                    Category::CreatorPayout,
                    format!("Possible match to creator: {}", creator.name),
                );
                result.creator_id = Some(creator.id.clone());
                result
            })
    }

    fn match_campaign(&self, tx: &Transaction, upper: &str, ids: &Identifiers) -> Option<MatchResult> {
        let campaign = self.campaigns.iter().find(|campaign| {
            let brand = campaign.brand_name.trim();
            if brand.is_empty() {
                return false;
            }
            upper.contains(&brand.to_uppercase())
                || ids
                    .possible_companies
                    .iter()
                    .any(|company| similarity(company, brand) > self.thresholds.company_similarity)
        })?;

        let amount_matches = tx
            .amount
            .is_within(campaign.total_budget, self.thresholds.amount_tolerance);
        let (confidence, suffix) = if amount_matches {
            (CONFIDENCE_BRAND_AMOUNT, " (amount matches)")
        } else {
            (CONFIDENCE_BRAND, "")
        };
        let mut result = MatchResult::new(
            MatchStrategy::CampaignBrand,
            confidence,
            Category::BrandPayment,
            format!("Matched brand: {}{}", campaign.brand_name, suffix),
        );
        result.campaign_id = Some(campaign.id.clone());
        Some(result)
    }

    fn match_rule(&self, tx: &Transaction) -> Option<MatchResult> {
        let rule = self.rules.find_match(&tx.raw_description)?;
        let mut result = MatchResult::new(
            MatchStrategy::Rule,
            CONFIDENCE_RULE,
            rule.category,
            format!("Matched rule: {}", rule.name),
        );
        match rule.target {
            RuleTarget::Brand => result.campaign_id = rule.entity_id.clone(),
            RuleTarget::Creator => result.creator_id = rule.entity_id.clone(),
            RuleTarget::Expense => {}
        }
        Some(result)
    }
}

/// Keyword guesses used when nothing more specific matched.
fn heuristic(tx: &Transaction, upper: &str) -> Option<MatchResult> {
    if tx.is_debit() {
        if let Some(keyword) = OPERATING_EXPENSE_KEYWORDS.iter().find(|k| upper.contains(*k)) {
            return Some(MatchResult::new(
                MatchStrategy::Heuristic,
                CONFIDENCE_EXPENSE_KEYWORD,
                Category::OperatingExpense,
                format!("Likely operating expense: {keyword}"),
            ));
        }
        if upper.contains("ZELLE") || upper.contains("WIRE") {
            return Some(MatchResult::new(
                MatchStrategy::Heuristic,
                CONFIDENCE_PAYMENT_RAIL,
                Category::CreatorPayout,
                "Outgoing payment (Zelle/Wire)".to_string(),
            ));
        }
    } else if upper.contains("ACH CREDIT") || upper.contains("WIRE") {
        return Some(MatchResult::new(
            MatchStrategy::Heuristic,
            CONFIDENCE_PAYMENT_RAIL,
            Category::BrandPayment,
            "Incoming payment (ACH/Wire)".to_string(),
        ));
    }
    None
}

pub fn match_transaction(
    tx: &Transaction,
    campaigns: &[Campaign],
    rules: &RuleSet,
    creator_payments: &[CreatorPaymentInfo],
    roster: &[RosterCreator],
) -> Transaction {
    MatchingEngine::new(campaigns, rules, creator_payments, roster).match_transaction(tx)
}

pub fn match_all_transactions(
    transactions: &[Transaction],
    campaigns: &[Campaign],
    rules: &RuleSet,
    creator_payments: &[CreatorPaymentInfo],
    roster: &[RosterCreator],
) -> Vec<Transaction> {
    MatchingEngine::new(campaigns, rules, creator_payments, roster).match_all(transactions)
}
