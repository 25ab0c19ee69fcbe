pub mod csv;
pub mod extract;
pub mod fuzzy;
pub mod match_engine;
pub mod rules;

pub use crate::csv::{FormatError, ParsedStatement, RejectedRow, RowError};
pub use extract::{Extractor, Identifiers};
pub use fuzzy::similarity;
pub use match_engine::{
    match_all_transactions, match_transaction, MatchResult, MatchStrategy, MatchThresholds,
    MatchingEngine,
};
pub use rules::{parse_rule_file, RuleError, RuleSet};
