use amie_core::{MatchingRule, RulePattern};
use chrono::Utc;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to parse rules TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Internal pairing of a rule with its precompiled regex (if applicable).
struct CompiledRule {
    rule: MatchingRule,
    compiled_regex: Option<Regex>,
}

/// Active rules ordered by descending priority; ties keep their given order.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<MatchingRule>,
}

/// Reads every rule of a `[[rules]]` file, inactive ones included.
pub fn parse_rule_file(toml_content: &str) -> Result<Vec<MatchingRule>, RuleError> {
    let file: RuleFile = toml::from_str(toml_content)?;
    Ok(file.rules)
}

impl RuleSet {
    pub fn new(rules: Vec<MatchingRule>) -> Self {
        let mut compiled: Vec<CompiledRule> = rules
            .into_iter()
            .filter(|rule| rule.is_active)
            .map(|rule| {
                let compiled_regex = match &rule.pattern {
                    RulePattern::Regex(pattern) => {
                        match RegexBuilder::new(pattern).case_insensitive(true).build() {
                            Ok(re) => Some(re),
                            Err(e) => {
                                tracing::warn!(
                                    rule = %rule.id,
                                    %pattern,
                                    error = %e,
                                    "Invalid rule regex, rule will never match"
                                );
                                None
                            }
                        }
                    }
                    RulePattern::Literal(_) => None,
                };
                CompiledRule { rule, compiled_regex }
            })
            .collect();
        // Highest priority first; sort_by is stable.
        compiled.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        Self { rules: compiled }
    }

    pub fn defaults() -> Self {
        Self::new(MatchingRule::defaults(Utc::now()))
    }

    pub fn find_match(&self, raw_description: &str) -> Option<&MatchingRule> {
        self.rules
            .iter()
            .find(|cr| Self::rule_matches(cr, raw_description))
            .map(|cr| &cr.rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchingRule> {
        self.rules.iter().map(|cr| &cr.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn rule_matches(cr: &CompiledRule, raw_description: &str) -> bool {
        match &cr.rule.pattern {
            RulePattern::Literal(pattern) => {
                !pattern.is_empty()
                    && raw_description
                        .to_uppercase()
                        .contains(&pattern.to_uppercase())
            }
            RulePattern::Regex(_) => cr
                .compiled_regex
                .as_ref()
                .is_some_and(|re| re.is_match(raw_description)),
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::defaults()
    }
}
