use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::transaction::Category;

/// A rule pattern. Literal patterns are never interpreted as regex syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RulePattern {
    Literal(String),
    Regex(String),
}

impl RulePattern {
    pub fn as_str(&self) -> &str {
        match self {
            RulePattern::Literal(p) | RulePattern::Regex(p) => p,
        }
    }
}

impl fmt::Display for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePattern::Literal(p) => write!(f, "{p}"),
            RulePattern::Regex(p) => write!(f, "/{p}/"),
        }
    }
}

/// Which kind of entity a rule links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    Brand,
    Creator,
    Expense,
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Brand => write!(f, "brand"),
            RuleTarget::Creator => write!(f, "creator"),
            RuleTarget::Expense => write!(f, "expense"),
        }
    }
}

impl std::str::FromStr for RuleTarget {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "brand" => Ok(RuleTarget::Brand),
            "creator" => Ok(RuleTarget::Creator),
            "expense" => Ok(RuleTarget::Expense),
            other => Err(format!("Unknown rule target: '{other}'")),
        }
    }
}

fn default_active() -> bool {
    true
}

/// User-authored override consulted when entity matching finds nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingRule {
    pub id: String,
    pub name: String,
    pub pattern: RulePattern,
    pub target: RuleTarget,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub entity_name: Option<String>,
    pub category: Category,
    /// Higher wins.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl MatchingRule {
    pub fn literal(
        id: &str,
        name: &str,
        pattern: &str,
        target: RuleTarget,
        category: Category,
        priority: i32,
        now: DateTime<Utc>,
    ) -> Self {
        MatchingRule {
            id: id.to_string(),
            name: name.to_string(),
            pattern: RulePattern::Literal(pattern.to_string()),
            target,
            entity_id: None,
            entity_name: None,
            category,
            priority,
            is_active: true,
            created_at: now,
        }
    }

    /// Rules in effect before anyone has configured their own.
    pub fn defaults(now: DateTime<Utc>) -> Vec<MatchingRule> {
        vec![
            MatchingRule::literal(
                "rule_zelle_out",
                "Zelle Outgoing",
                "ZELLE TO",
                RuleTarget::Creator,
                Category::CreatorPayout,
                10,
                now,
            ),
            MatchingRule::literal(
                "rule_wire_out",
                "Wire Outgoing",
                "WIRE TRANSFER OUT",
                RuleTarget::Creator,
                Category::CreatorPayout,
                10,
                now,
            ),
            MatchingRule::literal(
                "rule_ach_in",
                "ACH Credit (Brand Payment)",
                "ACH CREDIT",
                RuleTarget::Brand,
                Category::BrandPayment,
                5,
                now,
            ),
            MatchingRule::literal(
                "rule_wire_in",
                "Wire Incoming (Brand Payment)",
                "WIRE TYPE:WIRE IN",
                RuleTarget::Brand,
                Category::BrandPayment,
                5,
                now,
            ),
        ]
    }
}
